//! Errors produced by the action and transport layers, already classified at
//! the point they were received from the control plane.

// External crates
use std::time::Duration;

/// Failure of the remote operation itself. Ends polling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("staging failed: {reason}")]
    StagingFailed { reason: String },
    #[error("staging failed, no app detected: {reason}")]
    StagingFailedNoAppDetected { reason: String },
    #[error("staging of app {app_name} timed out after {timeout:?}")]
    StagingTimeout { app_name: String, timeout: Duration },
    #[error("instance of app {name} crashed")]
    InstanceCrashed { name: String },
    #[error("instance of app {name} is flapping")]
    InstanceFlapping { name: String },
    #[error("app {name} did not start in time")]
    StartupTimeout { name: String },
    #[error("App '{name}' not found")]
    ApplicationNotFound { name: String },
    #[error("{0}")]
    Api(String),
}

/// Failure of the log delivery channel, distinct from the operation it reports on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogTransportError {
    #[error("timeout connecting to log server, no log will be shown")]
    Timeout,
    #[error("Failed to retrieve logs: {0}")]
    Unexpected(String),
}

/// Failure to refresh the access token while a stream is open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to refresh access token: {0}")]
pub struct RefreshError(pub String);
