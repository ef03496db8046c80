/// ======================================================================
///                                 GOALS
/// ======================================================================
///
/// 1. A background task is never left running once its owner returns
/// 2. Nothing the task reported before stopping is lost
/// 3. Teardown happens in a fixed order: stop, confirm stopped, drain
///
/// ======================================================================
///                             BUILDING BLOCKS
/// ======================================================================
///
/// 1. Stop signal
/// - A `CancellationToken` owned by the caller. The task selects on
/// `cancelled()` next to its own work and leaves its loop when it fires.
///
/// 2. Completion signal
/// - A oneshot the task fires as the very last thing it does. The caller
/// waits on it before tearing down anything the task still writes to.
///
/// 3. Interrupt listener
/// - Ctrl+C as a plain future, so loops can treat a user interrupt like any
/// other branch of their select.
// External crates
use tokio::{signal, sync::oneshot};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Caller side of a background task's lifecycle.
///
/// - `token()` hands the stop signal to the task (and anything else that
/// needs to observe it).
/// - `trigger()` requests the stop.
/// - `wait_for_shutdown()` returns once the task confirmed it exited.
#[derive(Debug)]
pub struct Shutdown {
    stop: CancellationToken,
    stopped_rx: oneshot::Receiver<()>,
}

/// Task side of the completion signal. Dropping it without calling
/// [`ShutdownConfirm::confirm`] also releases the waiter.
#[derive(Debug)]
pub struct ShutdownConfirm {
    stopped_tx: oneshot::Sender<()>,
}

impl Shutdown {
    #[instrument(
        name = "paasctl_shutdown_channel",
        target = "helpers::shutdown",
        level = "trace"
    )]
    pub fn new() -> (Self, ShutdownConfirm) {
        tracing::trace!("Creating background task shutdown handshake");
        let (stopped_tx, stopped_rx) = oneshot::channel();
        (
            Self {
                stop: CancellationToken::new(),
                stopped_rx,
            },
            ShutdownConfirm { stopped_tx },
        )
    }

    /// Stop signal to hand to the task.
    pub fn token(&self) -> CancellationToken {
        self.stop.clone()
    }

    #[instrument(
        name = "paasctl_shutdown_trigger",
        target = "helpers::shutdown",
        level = "trace",
        skip_all
    )]
    pub fn trigger(&self) {
        tracing::trace!("Shutdown triggered");
        self.stop.cancel();
    }

    /// Block until the task confirmed (or dropped) its completion signal.
    #[instrument(
        name = "paasctl_shutdown_waiter",
        target = "helpers::shutdown",
        level = "trace",
        skip_all
    )]
    pub async fn wait_for_shutdown(self) {
        tracing::trace!("Waiting for background task to confirm shutdown");
        let _ = self.stopped_rx.await;
        tracing::trace!("Background task confirmed shutdown");
    }
}

impl ShutdownConfirm {
    pub fn confirm(self) {
        let _ = self.stopped_tx.send(());
    }
}

/// Resolves on Ctrl+C. If the listener cannot be installed the future never
/// resolves, leaving the other branches of the caller's select in charge.
pub async fn interrupt_signal() {
    match signal::ctrl_c().await {
        Ok(()) => tracing::debug!("Ctrl+C received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            futures::future::pending::<()>().await;
        }
    }
}
