// src/bridge/mod.rs

//! Orchestration bridge: the controller-facing facade.
//!
//! Requests (`run`, `stop`) are answered with an [`Ack`]; events are pushed
//! to subscribers. All run events travel through one [`EventSink`] into a
//! dispatcher task, which publishes them in order to the [`SubscriberHub`].
//!
//! ```text
//!   supervisor ─┐
//!   stdout task ├──► EventSink ──► dispatcher ──► hub ──► subscriber 1..N
//!   stderr task ┘
//! ```

pub mod hub;
pub mod sink;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, OrchestratorConfig};
use crate::engine::{LifecycleState, RunId, RunInfo, StopOutcome, Supervisor, SupervisorOptions};
use crate::fs::{FileSystem, RealFileSystem};
use crate::resolver::RuntimeResolver;
use crate::types::LogEvent;

pub use hub::{SubscriberHub, Subscription, SubscriptionId};
pub use sink::EventSink;

/// Capacity of the queue between producers and the dispatcher.
const EVENT_QUEUE: usize = 256;

/// Acknowledgement returned for every controller request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn started(run_id: RunId) -> Self {
        Self {
            success: true,
            run_id: Some(run_id),
            message: Some(format!("agent run {run_id} started")),
            error: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            run_id: None,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            run_id: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

pub struct Bridge {
    supervisor: Supervisor,
    hub: SubscriberHub,
    sink: EventSink,
    dispatcher: JoinHandle<()>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("supervisor", &self.supervisor)
            .field("subscribers", &self.hub.len())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Bridge over the real filesystem. Must be called inside a Tokio
    /// runtime.
    pub fn new(cfg: &OrchestratorConfig) -> Self {
        Self::with_filesystem(cfg, Arc::new(RealFileSystem))
    }

    /// Bridge whose resolver probes through `fs`.
    pub fn with_filesystem(cfg: &OrchestratorConfig, fs: Arc<dyn FileSystem>) -> Self {
        let (sink, rx) = EventSink::channel(EVENT_QUEUE);
        let hub = SubscriberHub::new();
        let dispatcher = tokio::spawn(dispatch(rx, hub.clone()));
        let supervisor = Supervisor::new(
            RuntimeResolver::from_config(cfg),
            fs,
            SupervisorOptions::from(cfg),
            sink.clone(),
        );

        Self {
            supervisor,
            hub,
            sink,
            dispatcher,
        }
    }

    /// Parse `config_json` and start a run with it.
    ///
    /// A malformed document is reported both as an `error` event and in
    /// the returned `Ack`; no run starts.
    pub async fn run(&self, config_json: &str) -> Ack {
        match AgentConfig::parse(config_json) {
            Ok(config) => self.run_config(&config).await,
            Err(e) => {
                warn!(error = %e, "rejecting malformed agent configuration");
                self.sink.emit(LogEvent::error(e.to_string())).await;
                Ack::failed(e.to_string())
            }
        }
    }

    pub async fn run_config(&self, config: &AgentConfig) -> Ack {
        match self.supervisor.start(config).await {
            Ok(run_id) => {
                info!(run_id, agent = config.name().unwrap_or("-"), "agent run accepted");
                Ack::started(run_id)
            }
            Err(e) => Ack::failed(e.to_string()),
        }
    }

    pub async fn stop(&self) -> Ack {
        match self.supervisor.stop().await {
            StopOutcome::NothingToStop => Ack::ok("nothing to stop"),
            StopOutcome::Stopped(exit) => Ack::ok(format!("agent stopped ({exit})")),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Invoke `callback` for every event from now on, on a background task.
    pub fn on_event<F>(&self, mut callback: F) -> SubscriptionId
    where
        F: FnMut(LogEvent) + Send + 'static,
    {
        let mut sub = self.hub.subscribe();
        let id = sub.id();
        tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                callback(event);
            }
        });
        id
    }

    pub fn state(&self) -> LifecycleState {
        self.supervisor.state()
    }

    pub fn current(&self) -> Option<RunInfo> {
        self.supervisor.current()
    }

    /// Stop any active run and wait until every queued event has been
    /// delivered to subscribers.
    pub async fn shutdown(self) {
        let Self {
            supervisor,
            hub: _,
            sink,
            dispatcher,
        } = self;

        if let StopOutcome::Stopped(exit) = supervisor.stop().await {
            info!(%exit, "active run stopped during shutdown");
        }
        drop(supervisor);
        drop(sink);

        if let Err(e) = dispatcher.await {
            warn!(error = %e, "event dispatcher ended abnormally");
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<LogEvent>, hub: SubscriberHub) {
    while let Some(event) = rx.recv().await {
        hub.publish(&event);
    }
    debug!("event sink closed; dispatcher exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serialises_without_empty_fields() {
        let json = serde_json::to_value(Ack::started(4)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["run_id"], 4);
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(Ack::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "boom" }));
    }
}
