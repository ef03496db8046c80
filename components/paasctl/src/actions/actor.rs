// Local crates
use crate::{actions::models::Application, errors::action_error::ActionError, events::models::EventChannels};

// External crates
use std::future::Future;

/// Control plane operations the commands are built on.
///
/// Every lifecycle operation returns immediately with the queues of the
/// operation. The producers run on their own tasks and close every queue
/// when the operation ends, whether it succeeded or failed.
pub trait AppActor: Send + Sync + 'static {
    fn get_application(
        &self,
        name: &str,
        space_name: &str,
    ) -> impl Future<Output = Result<Application, ActionError>> + Send;

    /// Stage if needed, then start a stopped application.
    fn start_application(&self, app: &Application) -> EventChannels;

    /// Stop if running, then stage if needed and start.
    fn restart_application(&self, app: &Application) -> EventChannels;

    /// Stage the current package again, then restart on the new droplet.
    fn restage_application(&self, app: &Application) -> EventChannels;

    /// Replace instances one by one through a deployment, without stopping.
    fn restart_application_with_deployment(&self, app: &Application) -> EventChannels;
}
