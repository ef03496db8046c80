// Local crates
use crate::errors::action_error::{ActionError, LogTransportError};

// External crates
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Source type the log transport tags staging output with.
pub const STAGING_SOURCE_TYPE: &str = "STG";

/// Default capacity of each event channel handed out by the action layer.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Stream a log line was written to by the remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogMessageType {
    Out,
    Err,
}

impl LogMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogMessageType::Out => "OUT",
            LogMessageType::Err => "ERR",
        }
    }
}

/// A single timestamped log line produced by the log transport. Immutable once
/// built; the consumer renders it once and drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    message: String,
    message_type: LogMessageType,
    timestamp: DateTime<Utc>,
    source_type: String,
    source_instance: String,
}

impl LogMessage {
    pub fn new(
        message: impl Into<String>,
        message_type: LogMessageType,
        timestamp: DateTime<Utc>,
        source_type: impl Into<String>,
        source_instance: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            message_type,
            timestamp,
            source_type: source_type.into(),
            source_instance: source_instance.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn message_type(&self) -> LogMessageType {
        self.message_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn source_instance(&self) -> &str {
        &self.source_instance
    }

    /// True when the line was emitted while the app was being staged.
    pub fn staging(&self) -> bool {
        self.source_type == STAGING_SOURCE_TYPE
    }
}

/// Milestones of a remote lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStateChange {
    Stopping,
    Staging,
    Starting,
}

impl AppStateChange {
    /// One-time notice rendered the first time the milestone is observed.
    pub fn notice(&self) -> &'static str {
        match self {
            AppStateChange::Stopping => "Stopping app...",
            AppStateChange::Staging => "Staging app and tracing logs...",
            AppStateChange::Starting => "Waiting for app to start...",
        }
    }
}

/// An event tagged with its position in the operation's send order.
#[derive(Debug)]
pub struct Stamped<T> {
    pub seq: u64,
    pub event: T,
}

/// Producing half of one event queue.
///
/// All five queues of an operation share one clock. A slot is reserved
/// before the clock is read, so stamps follow the order in which events
/// actually became receivable.
#[derive(Debug)]
pub struct EventSender<T> {
    tx: mpsc::Sender<Stamped<T>>,
    clock: Arc<AtomicU64>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T> EventSender<T> {
    /// Waits for capacity. Fails, handing the event back, once the receiver
    /// is gone.
    pub async fn send(&self, event: T) -> Result<(), mpsc::error::SendError<T>> {
        match self.tx.reserve().await {
            Ok(permit) => {
                let seq = self.clock.fetch_add(1, Ordering::Relaxed);
                permit.send(Stamped { seq, event });
                Ok(())
            }
            Err(_) => Err(mpsc::error::SendError(event)),
        }
    }

    /// Resolves once the receiver has been dropped.
    #[cfg(test)]
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Receiving half of one event queue.
#[derive(Debug)]
pub struct EventReceiver<T> {
    rx: mpsc::Receiver<Stamped<T>>,
}

impl<T> EventReceiver<T> {
    #[cfg(test)]
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await.map(|stamped| stamped.event)
    }

    pub async fn recv_stamped(&mut self) -> Option<Stamped<T>> {
        self.rx.recv().await
    }

    pub fn try_recv_stamped(&mut self) -> Result<Stamped<T>, TryRecvError> {
        self.rx.try_recv()
    }
}

fn event_queue<T>(capacity: usize, clock: &Arc<AtomicU64>) -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        EventSender {
            tx,
            clock: clock.clone(),
        },
        EventReceiver { rx },
    )
}

/// Receiving halves of the queues an action hands back to a command.
///
/// Every queue is closed by its producer by dropping the sender. Only the
/// fatal `errors` queue is mandatory; a `None` queue is treated as already
/// closed.
#[derive(Debug)]
pub struct EventChannels {
    pub messages: Option<EventReceiver<LogMessage>>,
    pub log_errors: Option<EventReceiver<LogTransportError>>,
    pub state_changes: Option<EventReceiver<AppStateChange>>,
    pub warnings: Option<EventReceiver<String>>,
    pub errors: EventReceiver<ActionError>,
}

/// Producing halves matching [`EventChannels`], owned by the action layer.
#[derive(Debug)]
pub struct EventSenders {
    pub messages: EventSender<LogMessage>,
    pub log_errors: EventSender<LogTransportError>,
    pub state_changes: EventSender<AppStateChange>,
    pub warnings: EventSender<String>,
    pub errors: EventSender<ActionError>,
}

/// Create the five bounded queues for a single operation, stamped from one
/// shared clock.
pub fn event_channels(capacity: usize) -> (EventSenders, EventChannels) {
    let clock = Arc::new(AtomicU64::new(0));
    let (messages_tx, messages_rx) = event_queue(capacity, &clock);
    let (log_errors_tx, log_errors_rx) = event_queue(capacity, &clock);
    let (state_tx, state_rx) = event_queue(capacity, &clock);
    let (warnings_tx, warnings_rx) = event_queue(capacity, &clock);
    let (errors_tx, errors_rx) = event_queue(capacity, &clock);

    (
        EventSenders {
            messages: messages_tx,
            log_errors: log_errors_tx,
            state_changes: state_tx,
            warnings: warnings_tx,
            errors: errors_tx,
        },
        EventChannels {
            messages: Some(messages_rx),
            log_errors: Some(log_errors_rx),
            state_changes: Some(state_rx),
            warnings: Some(warnings_rx),
            errors: errors_rx,
        },
    )
}

/// Receive from a queue that may already have been dropped. A `None` queue
/// never resolves, so callers guard the branch with `if rx.is_some()`.
pub async fn recv_open<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => futures::future::pending().await,
    }
}
