//! Poller - multiplexes the event queues of a long-running operation
//!
//! Start, restart, restage and rolling restart all hand back the same five
//! queues from the action layer. The poller drains them on the caller's task,
//! renders every event as it is observed, and returns once the operation is
//! over:
//! - `Ok(())` when every queue it was given has been observed closed,
//! - the translated error as soon as a fatal action error is observed.
//!
//! Ordering:
//! - Events are rendered in the order they were sent, across all queues.
//! Every event carries a stamp from a clock shared by the operation's queues.
//! The poller buffers at most one event per queue and always handles the
//! lowest stamp it holds, so a warning sent before two log lines is rendered
//! before them even when all three were already queued.
//! - The fatal error is handled in the same order. Everything sent before it
//! has been rendered when it is returned, and nothing sent after it is.
//! - A queue only reports closure after its buffered items, so a fatal error
//! always wins over "last queue closed".

// Local crates
use crate::{
    errors::{action_error::LogTransportError, command_error::CommandError},
    events::models::{AppStateChange, EventChannels, EventReceiver, LogMessage, Stamped},
    ui::ui::Ui,
};

// External crates
use std::collections::HashSet;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::instrument;

/// Outcome of a poll: success, or one classified fatal error.
pub type PollResult = Result<(), CommandError>;

/// Which log lines are shown while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFilter {
    /// Only lines tagged with the staging source.
    #[default]
    StagingOnly,
    All,
}

impl LogFilter {
    pub fn admits(&self, message: &LogMessage) -> bool {
        match self {
            LogFilter::StagingOnly => message.staging(),
            LogFilter::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub app_name: String,
    pub binary_name: String,
    pub log_filter: LogFilter,
}

/// Per-call render state. Never outlives a single [`poll`].
#[derive(Debug, Default)]
struct PollState {
    notices_shown: HashSet<AppStateChange>,
    logs_timed_out: bool,
}

impl PollState {
    fn on_state_change<U: Ui + ?Sized>(&mut self, ui: &U, change: AppStateChange) {
        tracing::debug!(state = ?change, "Application state changed");
        if self.notices_shown.insert(change) {
            ui.display_notice(change.notice());
        }
    }

    /// Returns true when log consumption should stop.
    fn on_log_error<U: Ui + ?Sized>(&mut self, ui: &U, err: &LogTransportError) -> bool {
        match err {
            LogTransportError::Timeout => {
                if !self.logs_timed_out {
                    self.logs_timed_out = true;
                    ui.display_notice(&err.to_string());
                }
                true
            }
            LogTransportError::Unexpected(_) => {
                ui.display_warning(&err.to_string());
                false
            }
        }
    }
}

/// One queue plus the earliest event taken from it and not yet handled.
#[derive(Debug)]
struct Lane<T> {
    name: &'static str,
    rx: Option<EventReceiver<T>>,
    head: Option<Stamped<T>>,
}

impl<T> Lane<T> {
    fn new(name: &'static str, rx: Option<EventReceiver<T>>) -> Self {
        Self { name, rx, head: None }
    }

    fn listening(&self) -> bool {
        self.rx.is_some()
    }

    fn next_seq(&self) -> Option<u64> {
        self.head.as_ref().map(|stamped| stamped.seq)
    }

    fn take(&mut self) -> Option<T> {
        self.head.take().map(|stamped| stamped.event)
    }

    /// Stop consuming: drops the buffered event and the receiver.
    fn close(&mut self) {
        self.head = None;
        self.rx = None;
    }

    fn on_closed(&mut self) {
        tracing::trace!(queue = self.name, "Event queue closed");
        self.rx = None;
    }

    /// Buffer the next queued event, if any, without waiting.
    fn fill(&mut self) {
        if self.head.is_some() {
            return;
        }
        if let Some(rx) = self.rx.as_mut() {
            match rx.try_recv_stamped() {
                Ok(stamped) => self.head = Some(stamped),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.on_closed(),
            }
        }
    }

    /// Wait until the queue yields an event or closes. Only called on an
    /// empty head; never resolves once the receiver is gone.
    async fn wait(&mut self) {
        let next = match self.rx.as_mut() {
            Some(rx) => rx.recv_stamped().await,
            None => futures::future::pending().await,
        };
        match next {
            Some(stamped) => self.head = Some(stamped),
            None => self.on_closed(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Queue {
    Messages,
    LogErrors,
    StateChanges,
    Warnings,
    Errors,
}

/// Drain the queues of one operation until it succeeds or fails.
#[instrument(
    name = "paasctl_poller::poll",
    target = "poller::poller",
    level = "debug",
    skip_all,
    fields(app = %options.app_name)
)]
pub async fn poll<U: Ui + ?Sized>(
    channels: EventChannels,
    ui: &U,
    options: &PollOptions,
) -> PollResult {
    let EventChannels {
        messages,
        log_errors,
        state_changes,
        warnings,
        errors,
    } = channels;
    let mut messages = Lane::new("messages", messages);
    let mut log_errors = Lane::new("log_errors", log_errors);
    let mut state_changes = Lane::new("state_changes", state_changes);
    let mut warnings = Lane::new("warnings", warnings);
    let mut errors = Lane::new("errors", Some(errors));
    let mut state = PollState::default();

    loop {
        messages.fill();
        log_errors.fill();
        state_changes.fill();
        warnings.fill();
        errors.fill();

        let next = [
            (Queue::Messages, messages.next_seq()),
            (Queue::LogErrors, log_errors.next_seq()),
            (Queue::StateChanges, state_changes.next_seq()),
            (Queue::Warnings, warnings.next_seq()),
            (Queue::Errors, errors.next_seq()),
        ]
        .into_iter()
        .filter_map(|(queue, seq)| seq.map(|seq| (seq, queue)))
        .min_by_key(|(seq, _)| *seq);

        match next.map(|(_, queue)| queue) {
            Some(Queue::Messages) => {
                if let Some(message) = messages.take()
                    && options.log_filter.admits(&message)
                {
                    ui.display_log_line(&message, false);
                }
            }
            Some(Queue::LogErrors) => {
                if let Some(err) = log_errors.take() {
                    tracing::debug!(error = %err, "Log transport error");
                    if state.on_log_error(ui, &err) {
                        messages.close();
                        log_errors.close();
                    }
                }
            }
            Some(Queue::StateChanges) => {
                if let Some(change) = state_changes.take() {
                    state.on_state_change(ui, change);
                }
            }
            Some(Queue::Warnings) => {
                if let Some(warning) = warnings.take() {
                    ui.display_warning(&warning);
                }
            }
            Some(Queue::Errors) => {
                if let Some(err) = errors.take() {
                    tracing::debug!(error = %err, "Operation failed");
                    return Err(CommandError::from_action(
                        err,
                        &options.app_name,
                        &options.binary_name,
                    ));
                }
            }
            None => {
                tokio::select! {
                    () = messages.wait(), if messages.listening() => {}
                    () = log_errors.wait(), if log_errors.listening() => {}
                    () = state_changes.wait(), if state_changes.listening() => {}
                    () = warnings.wait(), if warnings.listening() => {}
                    () = errors.wait(), if errors.listening() => {}
                    else => break,
                }
            }
        }
    }

    tracing::debug!("Every event queue closed, operation succeeded");
    Ok(())
}
