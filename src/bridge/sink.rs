// src/bridge/sink.rs

//! The single ordered funnel every run event passes through.

use tokio::sync::mpsc;
use tracing::trace;

use crate::types::LogEvent;

/// Sending half of the bridge's event queue.
///
/// Cheap to clone; the supervisor, both stream drainers and the stub all
/// hold one. Events from a single producer keep their order.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<LogEvent>,
}

impl EventSink {
    /// A sink plus the receiver the dispatcher reads from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LogEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `event`, waiting for room when the queue is full.
    ///
    /// Once the receiving side is gone the event is dropped silently.
    pub async fn emit(&self, event: LogEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event).await {
            trace!(kind = %event.kind, "event sink closed; dropping event");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
