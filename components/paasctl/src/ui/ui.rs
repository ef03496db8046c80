// Local crates
use crate::events::models::LogMessage;

// External crates
use chrono::{DateTime, Local, TimeZone};
use std::io::{self, Write};

/// Render target for everything a command shows the operator.
///
/// Calls render immediately and in call order; implementations must not
/// buffer in a way that could reorder events. Primary output (text, notices,
/// log lines) and the advisory stream (warnings, errors) are kept apart.
pub trait Ui: Send + Sync {
    fn display_text(&self, text: &str);
    fn display_notice(&self, text: &str);
    fn display_log_line(&self, message: &LogMessage, with_header: bool);
    fn display_warning(&self, text: &str);
    fn display_error(&self, err: &dyn std::error::Error);
}

/// `Ui` over the process stdout/stderr.
#[derive(Debug, Default)]
pub struct TerminalUi;

impl TerminalUi {
    pub fn new() -> Self {
        Self
    }

    fn write_out(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn write_err(&self, text: &str) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{text}");
        let _ = err.flush();
    }
}

impl Ui for TerminalUi {
    fn display_text(&self, text: &str) {
        self.write_out(text);
    }

    fn display_notice(&self, text: &str) {
        self.write_out(text);
    }

    fn display_log_line(&self, message: &LogMessage, with_header: bool) {
        for line in format_log_message(message, with_header, &Local) {
            self.write_out(&line);
        }
    }

    fn display_warning(&self, text: &str) {
        self.write_err(text);
    }

    fn display_error(&self, err: &dyn std::error::Error) {
        self.write_err(&err.to_string());
        self.write_err("FAILED");
    }
}

/// `2006-01-02T15:04:05.00-0700`, hundredths of a second.
pub fn format_log_timestamp<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}.{:02}{}",
        timestamp.format("%Y-%m-%dT%H:%M:%S"),
        timestamp.timestamp_subsec_millis() / 10,
        timestamp.format("%z"),
    )
}

/// One output line per line of the message, indented, optionally prefixed
/// with `time [source/instance] TYPE`.
pub fn format_log_message<Tz: TimeZone>(
    message: &LogMessage,
    with_header: bool,
    timezone: &Tz,
) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    let header = if with_header {
        format!(
            "{} [{}/{}] {} ",
            format_log_timestamp(&message.timestamp().with_timezone(timezone)),
            message.source_type(),
            message.source_instance(),
            message.message_type().as_str(),
        )
    } else {
        String::new()
    };

    message
        .message()
        .split('\n')
        .map(|line| format!("   {header}{}", line.trim_end_matches(['\r', '\n'])))
        .collect()
}

