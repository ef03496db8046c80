// Local crates
use crate::{
    actions::{actor::AppActor, models::Application},
    errors::command_error::CommandError,
    helpers::load_config::{Config, TargetConfig},
    poller::poller::{LogFilter, PollOptions},
    ui::ui::Ui,
};

/// "in org O / space S as U..." suffix of every command header.
pub fn as_target(target: &TargetConfig) -> String {
    format!(
        "in org {} / space {} as {}...",
        target.org, target.space, target.user
    )
}

pub fn poll_options(app_name: &str, config: &Config, log_filter: LogFilter) -> PollOptions {
    PollOptions {
        app_name: app_name.to_string(),
        binary_name: config.binary_name.clone(),
        log_filter,
    }
}

pub async fn find_application<A: AppActor>(
    actor: &A,
    config: &Config,
    app_name: &str,
) -> Result<Application, CommandError> {
    actor
        .get_application(app_name, &config.target.space)
        .await
        .map_err(CommandError::Action)
}

/// Short state summary rendered after a successful lifecycle operation.
pub async fn display_app_summary<A, U>(
    actor: &A,
    ui: &U,
    config: &Config,
    app_name: &str,
) -> Result<(), CommandError>
where
    A: AppActor,
    U: Ui + ?Sized,
{
    let app = find_application(actor, config, app_name).await?;
    let state = if app.started() { "started" } else { "stopped" };

    ui.display_text("");
    ui.display_text(&format!("name:              {}", app.name));
    ui.display_text(&format!("requested state:   {state}"));
    ui.display_text(&format!("instances:         {}", app.instances));
    Ok(())
}
