//! Scripted control plane
//!
//! Replays a JSON timeline onto the same queues a live control plane would
//! feed, with a delay before each event. Used by the binary when no live
//! endpoint is wired in, and by the end-to-end command tests.
//!
//! ```json
//! {
//!   "application": { "name": "web", "guid": "web-guid", "state": "stopped" },
//!   "operation": [
//!     { "event": { "state": "staging" } },
//!     { "after_ms": 200, "event": { "log": { "message": "Staging...", "source_type": "STG" } } },
//!     { "event": { "warning": "buildpack is deprecated" } },
//!     { "after_ms": 500, "event": { "state": "starting" } }
//!   ],
//!   "log_stream": [ { "after_ms": 100, "event": { "log": { "message": "GET / 200" } } } ],
//!   "refresh_failures": ["token revoked"]
//! }
//! ```

// Local crates
use crate::{
    actions::{
        actor::AppActor,
        models::{Application, ApplicationState, PackageState},
    },
    errors::action_error::{ActionError, LogTransportError, RefreshError},
    events::models::{
        AppStateChange, EVENT_CHANNEL_CAPACITY, EventChannels, EventSenders, LogMessage,
        LogMessageType, STAGING_SOURCE_TYPE, event_channels,
    },
    refresher::scheduler::TokenRefresher,
    streaming::stream_logs::{LogStream, LogTransport, StopStreaming},
};

// External crates
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse scenario file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A full scripted session: the app, what its lifecycle operations emit, and
/// what its log endpoints return.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub application: Application,
    /// Replayed by start, restart, restage and rolling restart.
    #[serde(default)]
    pub operation: Vec<Step>,
    /// Replayed by the live log stream. Only log events are meaningful here.
    #[serde(default)]
    pub log_stream: Vec<Step>,
    /// Close the live stream once `log_stream` is exhausted instead of
    /// keeping it open until stopped.
    #[serde(default)]
    pub close_log_stream: bool,
    #[serde(default)]
    pub recent_logs: Vec<ScriptedLog>,
    #[serde(default)]
    pub recent_logs_error: Option<String>,
    /// Reasons for consecutive token refresh failures. Later refreshes succeed.
    #[serde(default)]
    pub refresh_failures: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub after_ms: u64,
    pub event: ScriptedEvent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedEvent {
    Log(ScriptedLog),
    LogTimeout,
    LogError(String),
    State(AppStateChange),
    Warning(String),
    Fail(ScriptedFailure),
}

/// Fatal outcomes a timeline can end with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedFailure {
    StagingFailed { reason: String },
    StagingFailedNoAppDetected { reason: String },
    StagingTimeout,
    InstanceCrashed,
    InstanceFlapping,
    StartupTimeout,
    Api { message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedLog {
    pub message: String,
    #[serde(default = "default_message_type")]
    pub message_type: LogMessageType,
    #[serde(default = "default_source_type")]
    pub source_type: String,
    #[serde(default = "default_source_instance")]
    pub source_instance: String,
    /// Defaults to the moment the line is replayed.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_message_type() -> LogMessageType {
    LogMessageType::Out
}

fn default_source_type() -> String {
    "APP/PROC/WEB".to_string()
}

fn default_source_instance() -> String {
    "0".to_string()
}

impl ScriptedLog {
    fn to_message(&self) -> LogMessage {
        LogMessage::new(
            self.message.clone(),
            self.message_type,
            self.timestamp.unwrap_or_else(Utc::now),
            self.source_type.clone(),
            self.source_instance.clone(),
        )
    }
}

impl ScriptedFailure {
    fn into_action_error(self, app_name: &str, staging_timeout: Duration) -> ActionError {
        let name = app_name.to_string();
        match self {
            ScriptedFailure::StagingFailed { reason } => ActionError::StagingFailed { reason },
            ScriptedFailure::StagingFailedNoAppDetected { reason } => {
                ActionError::StagingFailedNoAppDetected { reason }
            }
            ScriptedFailure::StagingTimeout => ActionError::StagingTimeout {
                app_name: name,
                timeout: staging_timeout,
            },
            ScriptedFailure::InstanceCrashed => ActionError::InstanceCrashed { name },
            ScriptedFailure::InstanceFlapping => ActionError::InstanceFlapping { name },
            ScriptedFailure::StartupTimeout => ActionError::StartupTimeout { name },
            ScriptedFailure::Api { message } => ActionError::Api(message),
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Built-in session for `app_name`: a stopped app that stages and starts
    /// cleanly, then serves a short live log.
    pub fn demo(app_name: &str) -> Self {
        let staging = |message: &str| ScriptedLog {
            message: message.to_string(),
            message_type: LogMessageType::Out,
            source_type: STAGING_SOURCE_TYPE.to_string(),
            source_instance: "0".to_string(),
            timestamp: None,
        };
        let runtime = |message: &str| ScriptedLog {
            message: message.to_string(),
            message_type: LogMessageType::Out,
            source_type: default_source_type(),
            source_instance: "0".to_string(),
            timestamp: None,
        };
        let step = |after_ms: u64, event: ScriptedEvent| Step { after_ms, event };

        Self {
            application: Application::new(app_name, format!("{app_name}-guid")),
            operation: vec![
                step(0, ScriptedEvent::State(AppStateChange::Staging)),
                step(150, ScriptedEvent::Log(staging("Downloading buildpacks..."))),
                step(300, ScriptedEvent::Log(staging("Installing runtime dependencies"))),
                step(300, ScriptedEvent::Log(staging("Uploading droplet..."))),
                step(200, ScriptedEvent::State(AppStateChange::Starting)),
                step(100, ScriptedEvent::Log(runtime("Listening on port 8080"))),
            ],
            log_stream: vec![
                step(200, ScriptedEvent::Log(runtime("GET / 200 3ms"))),
                step(800, ScriptedEvent::Log(runtime("GET /health 200 1ms"))),
            ],
            close_log_stream: false,
            recent_logs: vec![runtime("Listening on port 8080")],
            recent_logs_error: None,
            refresh_failures: Vec::new(),
        }
    }
}

/// [`AppActor`] replaying a [`Scenario`].
#[derive(Debug, Clone)]
pub struct ScriptedControlPlane {
    scenario: Arc<Scenario>,
    app: Arc<Mutex<Application>>,
    timeouts: PhaseTimeouts,
}

/// How long the replay may spend in a phase before the phase times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub staging: Duration,
    pub startup: Duration,
}

impl PhaseTimeouts {
    fn limit(&self, phase: AppStateChange) -> Option<Duration> {
        match phase {
            AppStateChange::Stopping => None,
            AppStateChange::Staging => Some(self.staging),
            AppStateChange::Starting => Some(self.startup),
        }
    }

    fn expired(&self, phase: AppStateChange, app_name: &str) -> ActionError {
        match phase {
            AppStateChange::Staging => ActionError::StagingTimeout {
                app_name: app_name.to_string(),
                timeout: self.staging,
            },
            _ => ActionError::StartupTimeout {
                name: app_name.to_string(),
            },
        }
    }
}

impl ScriptedControlPlane {
    /// A phase of the timeline that runs past its limit in `timeouts` fails
    /// the operation with the matching timeout error.
    pub fn new(scenario: Scenario, timeouts: PhaseTimeouts) -> Self {
        let app = Arc::new(Mutex::new(scenario.application.clone()));
        Self {
            scenario: Arc::new(scenario),
            app,
            timeouts,
        }
    }

    pub fn transport(&self) -> ScriptedLogTransport {
        ScriptedLogTransport {
            scenario: self.scenario.clone(),
        }
    }

    pub fn refresher(&self) -> ScriptedTokenRefresher {
        ScriptedTokenRefresher {
            failures: Mutex::new(self.scenario.refresh_failures.iter().cloned().collect()),
        }
    }

    fn current(&self) -> Application {
        self.app.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replay(&self, app: &Application, prelude: Option<AppStateChange>) -> EventChannels {
        let (senders, channels) = event_channels(EVENT_CHANNEL_CAPACITY);
        let mut steps: Vec<Step> = prelude
            .map(|change| Step {
                after_ms: 0,
                event: ScriptedEvent::State(change),
            })
            .into_iter()
            .collect();
        steps.extend(self.scenario.operation.iter().cloned());

        tokio::spawn(replay_operation(
            steps,
            senders,
            self.app.clone(),
            app.name.clone(),
            self.timeouts,
        ));
        channels
    }
}

impl AppActor for ScriptedControlPlane {
    async fn get_application(&self, name: &str, _space_name: &str) -> Result<Application, ActionError> {
        let app = self.current();
        if app.name == name {
            Ok(app)
        } else {
            Err(ActionError::ApplicationNotFound {
                name: name.to_string(),
            })
        }
    }

    fn start_application(&self, app: &Application) -> EventChannels {
        self.replay(app, None)
    }

    fn restart_application(&self, app: &Application) -> EventChannels {
        let prelude = app.started().then_some(AppStateChange::Stopping);
        self.replay(app, prelude)
    }

    fn restage_application(&self, app: &Application) -> EventChannels {
        self.replay(app, None)
    }

    fn restart_application_with_deployment(&self, app: &Application) -> EventChannels {
        self.replay(app, None)
    }
}

/// Feed `steps` to the operation queues. Every queue is closed on return.
#[instrument(
    name = "paasctl_scripted::replay_operation",
    target = "actions::scripted",
    level = "debug",
    skip_all,
    fields(app = %app_name)
)]
async fn replay_operation(
    steps: Vec<Step>,
    senders: EventSenders,
    app: Arc<Mutex<Application>>,
    app_name: String,
    timeouts: PhaseTimeouts,
) {
    // Phase currently in progress and when it runs out of time.
    let mut phase: Option<(AppStateChange, Instant)> = None;

    for step in steps {
        let wait = Duration::from_millis(step.after_ms);
        if let Some((current, deadline)) = phase {
            if Instant::now() + wait > deadline {
                tokio::time::sleep_until(deadline).await;
                let err = timeouts.expired(current, &app_name);
                tracing::debug!(error = %err, "Scripted phase ran out of time");
                let _ = senders.errors.send(err).await;
                return;
            }
        }
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let delivered = match step.event {
            // The consumer may stop reading logs on its own; keep replaying.
            ScriptedEvent::Log(log) => {
                let _ = senders.messages.send(log.to_message()).await;
                true
            }
            ScriptedEvent::LogTimeout => {
                let _ = senders.log_errors.send(LogTransportError::Timeout).await;
                true
            }
            ScriptedEvent::LogError(reason) => {
                let _ = senders
                    .log_errors
                    .send(LogTransportError::Unexpected(reason))
                    .await;
                true
            }
            ScriptedEvent::State(change) => {
                phase = timeouts
                    .limit(change)
                    .map(|limit| (change, Instant::now() + limit));
                senders.state_changes.send(change).await.is_ok()
            }
            ScriptedEvent::Warning(warning) => senders.warnings.send(warning).await.is_ok(),
            ScriptedEvent::Fail(failure) => {
                let err = failure.into_action_error(&app_name, timeouts.staging);
                tracing::debug!(error = %err, "Scripted operation failed");
                let _ = senders.errors.send(err).await;
                return;
            }
        };

        if !delivered {
            tracing::debug!("Operation consumer went away, ending replay");
            return;
        }
    }

    let mut current = app.lock().unwrap_or_else(PoisonError::into_inner);
    current.state = ApplicationState::Started;
    current.package_state = PackageState::Staged;
    tracing::debug!("Scripted operation finished");
}

/// [`LogTransport`] replaying the scenario's log stream.
#[derive(Debug, Clone)]
pub struct ScriptedLogTransport {
    scenario: Arc<Scenario>,
}

impl LogTransport for ScriptedLogTransport {
    fn stream_logs(&self, app_guid: &str) -> LogStream {
        let (messages_tx, messages) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let steps = self.scenario.log_stream.clone();
        let close_when_done = self.scenario.close_log_stream;

        tracing::debug!(app_guid = %app_guid, "Opening scripted log stream");
        tokio::spawn(async move {
            for step in steps {
                tokio::select! {
                    biased;
                    _ = stopped.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(step.after_ms)) => {}
                }

                let delivered = match step.event {
                    ScriptedEvent::Log(log) => messages_tx.send(log.to_message()).await.is_ok(),
                    ScriptedEvent::LogTimeout => {
                        errors_tx.send(LogTransportError::Timeout).await.is_ok()
                    }
                    ScriptedEvent::LogError(reason) => errors_tx
                        .send(LogTransportError::Unexpected(reason))
                        .await
                        .is_ok(),
                    other => {
                        tracing::trace!(event = ?other, "Ignoring non-log event in log stream");
                        true
                    }
                };
                if !delivered {
                    return;
                }
            }

            if !close_when_done {
                stopped.cancelled().await;
            }
        });

        LogStream {
            messages,
            errors,
            stop_streaming: StopStreaming::new(move || stop.cancel()),
        }
    }

    async fn recent_logs(&self, app_guid: &str) -> Result<Vec<LogMessage>, LogTransportError> {
        tracing::debug!(app_guid = %app_guid, "Fetching scripted recent logs");
        match &self.scenario.recent_logs_error {
            Some(reason) => Err(LogTransportError::Unexpected(reason.clone())),
            None => Ok(self
                .scenario
                .recent_logs
                .iter()
                .map(ScriptedLog::to_message)
                .collect()),
        }
    }
}

/// [`TokenRefresher`] failing with the scenario's reasons, in order.
#[derive(Debug)]
pub struct ScriptedTokenRefresher {
    failures: Mutex<VecDeque<String>>,
}

impl TokenRefresher for ScriptedTokenRefresher {
    async fn refresh_access_token(&self) -> Result<(), RefreshError> {
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match failure {
            Some(reason) => Err(RefreshError(reason)),
            None => Ok(()),
        }
    }
}
