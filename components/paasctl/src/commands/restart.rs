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

/// How running instances are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RestartStrategy {
    /// Stop every instance, then start again.
    #[default]
    Stop,
    /// Replace instances one by one through a deployment.
    Rolling,
}

/// `paasctl restart <app> [--strategy rolling]`
#[instrument(
    name = "paasctl_commands::restart",
    target = "commands::restart",
    level = "info",
    skip_all,
    fields(app = %app_name, strategy = ?strategy, log_filter = ?log_filter)
)]
pub async fn restart<A, U>(
    actor: &A,
    ui: &U,
    config: &Config,
    app_name: &str,
    strategy: RestartStrategy,
    log_filter: LogFilter,
) -> Result<(), CommandError>
where
    A: AppActor,
    U: Ui + ?Sized,
{
    ui.display_text(&format!("Restarting app {app_name} {}", as_target(&config.target)));

    let app = find_application(actor, config, app_name).await?;
    let channels = match strategy {
        RestartStrategy::Stop => actor.restart_application(&app),
        RestartStrategy::Rolling => {
            ui.display_text(&format!("Creating deployment for app {}...", app.name));
            actor.restart_application_with_deployment(&app)
        }
    };

    poll(channels, ui, &poll_options(&app.name, config, log_filter)).await?;
    display_app_summary(actor, ui, config, &app.name).await
}
