//! Live log streaming
//!
//! Backs `paasctl logs <app>`. Unlike the poller, the log stream is the whole
//! point of the command, so a transport error ends it with an error. The loop
//! ends in exactly one of three ways:
//! - the remote source closed both queues: success,
//! - the transport reported an error: `FailedToRetrieveLogs`,
//! - the operator interrupted: success, no error rendered.
//!
//! The token refresh task lives exactly as long as the loop; it is shut down
//! (stop, confirm, drain) on every exit path before the result is returned.

// Local crates
use crate::{
    errors::{action_error::LogTransportError, command_error::CommandError},
    events::models::{LogMessage, recv_open},
    refresher::scheduler::{TickSource, TokenRefresher, start_token_refresh},
    ui::ui::Ui,
};

// External crates
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_stream::wrappers::IntervalStream;
use tracing::instrument;

/// Log delivery for a single application.
pub trait LogTransport: Send + Sync + 'static {
    /// Open a live stream. Both queues are closed by the transport when the
    /// remote source ends.
    fn stream_logs(&self, app_guid: &str) -> LogStream;

    /// Fetch the buffered recent logs in one request.
    fn recent_logs(
        &self,
        app_guid: &str,
    ) -> impl Future<Output = Result<Vec<LogMessage>, LogTransportError>> + Send;
}

/// Callback that tells the transport to stop delivering. Consumed on use, so
/// it runs at most once.
pub struct StopStreaming(Box<dyn FnOnce() + Send>);

impl StopStreaming {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(stop))
    }

    pub fn stop(self) {
        (self.0)();
    }
}

impl fmt::Debug for StopStreaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopStreaming").finish_non_exhaustive()
    }
}

/// An open live stream.
#[derive(Debug)]
pub struct LogStream {
    pub messages: mpsc::Receiver<LogMessage>,
    pub errors: mpsc::Receiver<LogTransportError>,
    pub stop_streaming: StopStreaming,
}

/// Terminal state of the streaming loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    LogsClosedCleanly,
    FatalTransportError(LogTransportError),
    UserInterrupted,
}

impl StreamOutcome {
    pub fn into_result(self) -> Result<(), CommandError> {
        match self {
            StreamOutcome::LogsClosedCleanly | StreamOutcome::UserInterrupted => Ok(()),
            StreamOutcome::FatalTransportError(err) => Err(err.into()),
        }
    }
}

/// Render a live stream until it closes, fails or `interrupt` resolves.
///
/// The stop callback is invoked on interrupt and on transport error. A stream
/// that closed on its own is not stopped again.
#[instrument(
    name = "paasctl_streaming::follow",
    target = "streaming::stream_logs",
    level = "debug",
    skip_all
)]
pub async fn follow<U, F>(stream: LogStream, ui: &U, interrupt: F) -> StreamOutcome
where
    U: Ui + ?Sized,
    F: Future<Output = ()>,
{
    let LogStream {
        messages,
        errors,
        stop_streaming,
    } = stream;
    let mut messages = Some(messages);
    let mut errors = Some(errors);
    tokio::pin!(interrupt);

    loop {
        if messages.is_none() && errors.is_none() {
            tracing::debug!("Log source closed");
            return StreamOutcome::LogsClosedCleanly;
        }

        tokio::select! {
            biased;

            () = &mut interrupt => {
                tracing::debug!("Log streaming interrupted by the operator");
                stop_streaming.stop();
                return StreamOutcome::UserInterrupted;
            }

            // Checked before messages: once the transport has failed nothing
            // more is read from the message queue.
            err = recv_open(&mut errors), if errors.is_some() => match err {
                Some(err) => {
                    tracing::warn!(error = %err, "Log transport failed while streaming");
                    stop_streaming.stop();
                    return StreamOutcome::FatalTransportError(err);
                }
                None => errors = None,
            },

            message = recv_open(&mut messages), if messages.is_some() => match message {
                Some(message) => ui.display_log_line(&message, true),
                None => messages = None,
            },
        }
    }
}

/// Streams an application's logs while keeping the access token fresh.
#[derive(Debug)]
pub struct LogStreamer<T, R> {
    transport: Arc<T>,
    refresher: Arc<R>,
    refresh_interval: Duration,
}

impl<T, R> LogStreamer<T, R>
where
    T: LogTransport,
    R: TokenRefresher,
{
    pub fn new(transport: Arc<T>, refresher: Arc<R>, refresh_interval: Duration) -> Self {
        Self {
            transport,
            refresher,
            refresh_interval,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stream with the token refreshed every `refresh_interval`, first
    /// refresh one interval after the stream opens.
    pub async fn stream<U, F>(
        &self,
        app_guid: &str,
        space_name: &str,
        ui: Arc<U>,
        interrupt: F,
    ) -> Result<(), CommandError>
    where
        U: Ui + ?Sized + 'static,
        F: Future<Output = ()>,
    {
        let period = self.refresh_interval.max(Duration::from_secs(1));
        let ticks = IntervalStream::new(interval_at(Instant::now() + period, period));
        self.stream_with_ticks(app_guid, space_name, ui, interrupt, ticks)
            .await
    }

    #[instrument(
        name = "paasctl_streaming::stream",
        target = "streaming::stream_logs",
        level = "info",
        skip_all,
        fields(app_guid = %app_guid, space = %space_name)
    )]
    pub async fn stream_with_ticks<U, F, K>(
        &self,
        app_guid: &str,
        space_name: &str,
        ui: Arc<U>,
        interrupt: F,
        ticks: K,
    ) -> Result<(), CommandError>
    where
        U: Ui + ?Sized + 'static,
        F: Future<Output = ()>,
        K: TickSource,
    {
        let stream = self.transport.stream_logs(app_guid);
        let refresh = start_token_refresh(self.refresher.clone(), ticks, ui.clone());

        let outcome = follow(stream, ui.as_ref(), interrupt).await;
        tracing::info!(outcome = ?outcome, "Log streaming finished");

        refresh.shutdown().await;
        outcome.into_result()
    }
}
