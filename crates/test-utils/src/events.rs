//! Helpers for collecting and inspecting event streams in tests.

use std::time::Duration;

use agentrun::bridge::Subscription;
use agentrun::types::{LogEvent, LogKind, WorkerExit};

/// Receive events until (and including) the next `exit` event.
///
/// Panics if no exit arrives within 10 seconds.
pub async fn collect_until_exit(sub: &mut Subscription) -> Vec<LogEvent> {
    let mut events = Vec::new();
    let collect = async {
        while let Some(event) = sub.recv().await {
            let done = event.kind == LogKind::Exit;
            events.push(event);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), collect)
        .await
        .expect("no exit event within 10 seconds");
    events
}

/// Receive whatever arrives until the stream is quiet for `quiet`.
pub async fn collect_for(sub: &mut Subscription, quiet: Duration) -> Vec<LogEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(quiet, sub.recv()).await {
        events.push(event);
    }
    events
}

/// Each event's label (worker record type or kind).
pub fn labels(events: &[LogEvent]) -> Vec<String> {
    events.iter().map(|e| e.label().to_string()).collect()
}

pub fn of_kind(events: &[LogEvent], kind: LogKind) -> Vec<&LogEvent> {
    events.iter().filter(|e| e.kind == kind).collect()
}

/// Exit outcome of the last event, which must be an `exit`.
pub fn final_exit(events: &[LogEvent]) -> WorkerExit {
    events
        .last()
        .and_then(LogEvent::worker_exit)
        .expect("last event is not an exit event")
}
