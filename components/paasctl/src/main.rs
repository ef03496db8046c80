//! paasctl: start, restart and restage applications on the platform and
//! follow their logs.

mod actions;
mod cli;
mod commands;
mod errors;
mod events;
mod helpers;
mod instrumentation;
mod poller;
mod refresher;
mod streaming;
mod ui;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    instrumentation::tracing::init_panic_handler();

    // Main entrypoint simply delegates control to CLI layer.
    // The CLI loads configuration, installs tracing and maps the command
    // outcome to the exit status.
    cli::cli::run().await
}
