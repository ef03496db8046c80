// Local crates
use crate::{
    actions::actor::AppActor,
    commands::common::{as_target, display_app_summary, find_application, poll_options},
    errors::command_error::CommandError,
    helpers::load_config::Config,
    poller::poller::{LogFilter, poll},
    ui::ui::Ui,
};

// External crates
use tracing::instrument;

/// `paasctl start <app>`
#[instrument(
    name = "paasctl_commands::start",
    target = "commands::start",
    level = "info",
    skip_all,
    fields(app = %app_name, log_filter = ?log_filter)
)]
pub async fn start<A, U>(
    actor: &A,
    ui: &U,
    config: &Config,
    app_name: &str,
    log_filter: LogFilter,
) -> Result<(), CommandError>
where
    A: AppActor,
    U: Ui + ?Sized,
{
    ui.display_text(&format!("Starting app {app_name} {}", as_target(&config.target)));

    let app = find_application(actor, config, app_name).await?;
    if app.started() {
        tracing::info!("Application already started, nothing to do");
        ui.display_text(&format!("App {} is already started", app.name));
        return Ok(());
    }

    poll(actor.start_application(&app), ui, &poll_options(&app.name, config, log_filter)).await?;
    display_app_summary(actor, ui, config, &app.name).await
}
