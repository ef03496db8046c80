// Local crates
use crate::{
    actions::actor::AppActor,
    commands::common::{as_target, find_application},
    errors::command_error::CommandError,
    helpers::load_config::Config,
    refresher::scheduler::TokenRefresher,
    streaming::stream_logs::{LogStreamer, LogTransport},
    ui::ui::Ui,
};

// External crates
use std::future::Future;
use std::sync::Arc;
use tracing::instrument;

/// `paasctl logs <app> [--recent]`
///
/// Without `--recent` the stream is followed until the remote source closes,
/// the transport fails or `interrupt` resolves.
#[instrument(
    name = "paasctl_commands::logs",
    target = "commands::logs",
    level = "info",
    skip_all,
    fields(app = %app_name, recent = recent)
)]
pub async fn logs<A, T, R, U, F>(
    actor: &A,
    streamer: &LogStreamer<T, R>,
    ui: Arc<U>,
    config: &Config,
    app_name: &str,
    recent: bool,
    interrupt: F,
) -> Result<(), CommandError>
where
    A: AppActor,
    T: LogTransport,
    R: TokenRefresher,
    U: Ui + ?Sized + 'static,
    F: Future<Output = ()>,
{
    ui.display_text(&format!(
        "Retrieving logs for app {app_name} {}",
        as_target(&config.target)
    ));
    ui.display_text("");

    let app = find_application(actor, config, app_name).await?;

    if recent {
        let mut messages = streamer.transport().recent_logs(&app.guid).await?;
        messages.sort_by_key(|message| message.timestamp());
        tracing::debug!(count = messages.len(), "Rendering recent logs");
        for message in &messages {
            ui.display_log_line(message, true);
        }
        return Ok(());
    }

    streamer
        .stream(&app.guid, &config.target.space, ui, interrupt)
        .await
}
