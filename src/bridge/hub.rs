// src/bridge/hub.rs

//! Subscriber fan-out.
//!
//! Each subscriber gets its own unbounded queue, so a slow observer never
//! holds back the dispatcher or other observers. Order is preserved per
//! subscriber. Subscribers whose receiver has been dropped are pruned on
//! the next publish.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::LogEvent;

/// Handle used to detach a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<LogEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, mpsc::UnboundedSender<LogEvent>)>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriberHub {
    inner: Arc<Mutex<Subscribers>>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.lock();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.entries.push((id, tx));
        debug!(subscriber = id.0, total = subs.entries.len(), "subscriber attached");
        Subscription { id, rx }
    }

    /// Detach `id`. Returns false when it was not attached.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        let before = subs.entries.len();
        subs.entries.retain(|(sid, _)| *sid != id);
        let removed = subs.entries.len() != before;
        if removed {
            debug!(subscriber = id.0, "subscriber detached");
        }
        removed
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&self, event: &LogEvent) {
        let mut subs = self.lock();
        subs.entries.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                debug!(subscriber = id.0, "subscriber went away; pruning");
            }
            alive
        });
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
