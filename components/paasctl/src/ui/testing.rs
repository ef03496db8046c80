// Local crates
use crate::events::models::LogMessage;
use crate::ui::ui::Ui;

// External crates
use std::sync::{Mutex, PoisonError};

/// What a [`RecordingUi`] was asked to render, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text(String),
    Notice(String),
    LogLine { message: String, with_header: bool },
    Warning(String),
    Error(String),
}

/// In-memory `Ui` used by the tests to assert on rendered output and order.
#[derive(Debug, Default)]
pub struct RecordingUi {
    entries: Mutex<Vec<Rendered>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Rendered> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Rendered::LogLine { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Rendered::Warning(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Rendered::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, entry: Rendered) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}

impl Ui for RecordingUi {
    fn display_text(&self, text: &str) {
        self.push(Rendered::Text(text.to_string()));
    }

    fn display_notice(&self, text: &str) {
        self.push(Rendered::Notice(text.to_string()));
    }

    fn display_log_line(&self, message: &LogMessage, with_header: bool) {
        self.push(Rendered::LogLine {
            message: message.message().to_string(),
            with_header,
        });
    }

    fn display_warning(&self, text: &str) {
        self.push(Rendered::Warning(text.to_string()));
    }

    fn display_error(&self, err: &dyn std::error::Error) {
        self.push(Rendered::Error(err.to_string()));
    }
}
