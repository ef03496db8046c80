//! User-facing command errors.
//!
//! Each variant carries enough context (app name, binary name for help text,
//! remote reason, configured timeout) to render an actionable message. Action
//! errors are translated exactly once, by [`CommandError::from_action`], and
//! every later consumer only matches on this type.

// Local crates
use crate::errors::action_error::{ActionError, LogTransportError};

// External crates
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Error staging application: {message}")]
    StagingFailed { message: String },

    #[error(
        "Error staging application: {message}\n\nTIP: Buildpacks are detected when the \"{binary_name} push\" is executed from within the directory that contains the app source code.\n\nUse '{binary_name} buildpacks' to see a list of supported buildpacks.\n\nUse '{binary_name} logs {app_name} --recent' for more in depth log information."
    )]
    StagingFailedNoAppDetected {
        message: String,
        app_name: String,
        binary_name: String,
    },

    #[error("Error staging application {app_name}: timed out after {} minute(s)", minutes(.timeout))]
    StagingTimeout { app_name: String, timeout: Duration },

    #[error(
        "Start unsuccessful\n\nTIP: use '{binary_name} logs {app_name} --recent' for more information"
    )]
    ApplicationUnableToStart {
        app_name: String,
        binary_name: String,
    },

    #[error(
        "Start app timeout\n\nTIP: Application must be listening on the right port. Instead of hard coding the port, use the $PORT environment variable.\n\nUse '{binary_name} logs {app_name} --recent' for more information"
    )]
    StartupTimeout {
        app_name: String,
        binary_name: String,
    },

    #[error("Failed to retrieve logs: {reason}")]
    FailedToRetrieveLogs { reason: String },

    #[error(transparent)]
    Action(ActionError),
}

/// Whole minutes, rounded up, never less than one.
fn minutes(timeout: &Duration) -> u64 {
    timeout.as_secs().div_ceil(60).max(1)
}

impl CommandError {
    /// Translate a fatal action error for the app being operated on.
    ///
    /// `app_name` is only used by variants whose action error does not carry
    /// the name itself.
    pub fn from_action(err: ActionError, app_name: &str, binary_name: &str) -> Self {
        match err {
            ActionError::StagingFailed { reason } => CommandError::StagingFailed { message: reason },
            ActionError::StagingFailedNoAppDetected { reason } => {
                CommandError::StagingFailedNoAppDetected {
                    message: reason,
                    app_name: app_name.to_string(),
                    binary_name: binary_name.to_string(),
                }
            }
            ActionError::StagingTimeout { app_name, timeout } => {
                CommandError::StagingTimeout { app_name, timeout }
            }
            ActionError::InstanceCrashed { name } | ActionError::InstanceFlapping { name } => {
                CommandError::ApplicationUnableToStart {
                    app_name: name,
                    binary_name: binary_name.to_string(),
                }
            }
            ActionError::StartupTimeout { name } => CommandError::StartupTimeout {
                app_name: name,
                binary_name: binary_name.to_string(),
            },
            other => CommandError::Action(other),
        }
    }
}

impl From<LogTransportError> for CommandError {
    fn from(err: LogTransportError) -> Self {
        let reason = match err {
            LogTransportError::Timeout => "timeout connecting to log server".to_string(),
            LogTransportError::Unexpected(reason) => reason,
        };
        CommandError::FailedToRetrieveLogs { reason }
    }
}
