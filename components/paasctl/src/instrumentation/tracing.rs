// Local crates
use crate::helpers::load_config::LoggingConfig;

// External crates
use std::panic;
use tracing::error;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    fmt,
    prelude::*,
    registry::Registry,
};

/// Variable holding a filter that replaces the configured level.
pub const LOG_FILTER_ENV: &str = "PAASCTL_LOG";

/// Install the global subscriber. Diagnostics go to a daily rolling file only;
/// the terminal belongs to the command output. Keep the guard alive until
/// exit so buffered lines are flushed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("paasctl")
        .filename_suffix("log")
        .build(&config.directory)?;
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let mut filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Poller and streaming decisions are the interesting part of a trace.
    if let Ok(poller_directive) = "poller=debug".parse::<Directive>() {
        filter = filter.add_directive(poller_directive);
    }
    if let Ok(streaming_directive) = "streaming=debug".parse::<Directive>() {
        filter = filter.add_directive(streaming_directive);
    }

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_writer.clone())
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_writer)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(json_layer)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

pub fn init_panic_handler() {
    panic::set_hook(Box::new(|panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => s.as_str(),
                None => "Unknown panic",
            },
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            message = %msg,
            location = %location,
            "paasctl panicked"
        );
        eprintln!("paasctl panicked at {location}: {msg}");
    }));
}
