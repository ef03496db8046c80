//! Token refresh scheduler
//!
//! Keeps the access token fresh while a long-lived log stream is open. Two
//! tasks are involved:
//! - the scheduler, which refreshes on every tick and pushes failures onto
//! an error queue instead of stopping,
//! - the drain, owned by the caller, which renders those failures and exits
//! only once the queue is closed and the stop signal has been observed.
//!
//! Teardown (`RefreshTask::shutdown`) is strictly ordered: cancel the stop
//! token, wait for the scheduler's completion signal, then wait for the drain.
//! The error queue has a single writer (the scheduler) that drops it on exit,
//! so nothing is ever sent on a closed queue and nothing queued is lost.

// Local crates
use crate::{
    errors::action_error::RefreshError,
    helpers::shutdown::{Shutdown, ShutdownConfirm},
    ui::ui::Ui,
};

// External crates
use std::future::Future;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const REFRESH_ERROR_CAPACITY: usize = 16;

/// Refreshes the credential used by the log transport.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh_access_token(&self) -> impl Future<Output = Result<(), RefreshError>> + Send;
}

/// Source of refresh ticks. `None` means the source is exhausted.
pub trait TickSource: Send + 'static {
    fn tick(&mut self) -> impl Future<Output = Option<()>> + Send;
}

impl TickSource for IntervalStream {
    async fn tick(&mut self) -> Option<()> {
        self.next().await.map(|_| ())
    }
}

impl TickSource for mpsc::Receiver<()> {
    async fn tick(&mut self) -> Option<()> {
        self.recv().await
    }
}

/// Spawn the scheduler. Returns the queue refresh failures are reported on;
/// it closes once the scheduler has exited.
#[instrument(
    name = "paasctl_refresher::schedule",
    target = "refresher::scheduler",
    level = "debug",
    skip_all
)]
pub fn schedule_refresh<R, T>(
    refresher: Arc<R>,
    mut ticks: T,
    stop: CancellationToken,
    stopped: ShutdownConfirm,
) -> mpsc::Receiver<RefreshError>
where
    R: TokenRefresher,
    T: TickSource,
{
    let (errors_tx, errors_rx) = mpsc::channel(REFRESH_ERROR_CAPACITY);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => {
                    tracing::debug!("Token refresh scheduler received stop signal");
                    break;
                }

                tick = ticks.tick() => {
                    if tick.is_none() {
                        tracing::debug!("Token refresh tick source exhausted");
                        break;
                    }

                    // Not raced against `stop`: a refresh that already started
                    // finishes and has its failure queued before the loop exits.
                    match refresher.refresh_access_token().await {
                        Ok(()) => tracing::debug!("Access token refreshed"),
                        Err(err) => {
                            tracing::warn!(error = %err, "Access token refresh failed");
                            if errors_tx.send(err).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        drop(errors_tx);
        stopped.confirm();
        tracing::debug!("Token refresh scheduler exited");
    });

    errors_rx
}

/// Running scheduler plus its drain task.
#[derive(Debug)]
pub struct RefreshTask {
    shutdown: Shutdown,
    drain: JoinHandle<()>,
}

/// Start refreshing in the background, rendering failures as warnings.
pub fn start_token_refresh<R, T, U>(refresher: Arc<R>, ticks: T, ui: Arc<U>) -> RefreshTask
where
    R: TokenRefresher,
    T: TickSource,
    U: Ui + ?Sized + 'static,
{
    let (shutdown, confirm) = Shutdown::new();
    let mut errors = schedule_refresh(refresher, ticks, shutdown.token(), confirm);
    let stop = shutdown.token();

    let drain = tokio::spawn(async move {
        while let Some(err) = errors.recv().await {
            ui.display_warning(&err.to_string());
        }
        stop.cancelled().await;
        tracing::trace!("Token refresh error drain exited");
    });

    RefreshTask { shutdown, drain }
}

impl RefreshTask {
    /// Stop, wait for the scheduler to confirm, then wait for the drain.
    #[instrument(
        name = "paasctl_refresher::shutdown",
        target = "refresher::scheduler",
        level = "debug",
        skip_all
    )]
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        self.shutdown.wait_for_shutdown().await;
        if let Err(e) = self.drain.await {
            tracing::error!(error = %e, "Token refresh error drain task failed");
        }
    }
}
