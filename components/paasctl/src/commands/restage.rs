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

/// `paasctl restage <app>`
#[instrument(
    name = "paasctl_commands::restage",
    target = "commands::restage",
    level = "info",
    skip_all,
    fields(app = %app_name, log_filter = ?log_filter)
)]
pub async fn restage<A, U>(
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
    ui.display_text(&format!("Restaging app {app_name} {}", as_target(&config.target)));

    let app = find_application(actor, config, app_name).await?;
    poll(actor.restage_application(&app), ui, &poll_options(&app.name, config, log_filter)).await?;
    display_app_summary(actor, ui, config, &app.name).await
}
