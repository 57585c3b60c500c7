// src/exec/stub.rs

//! Built-in fallback worker used when no runtime entry point resolves.
//!
//! It produces the same events a real worker would for the configuration:
//! `start`, one `step` per configured step (1-indexed, in order), then
//! `complete`. There are no timers; the script is a pure function of the
//! configuration.

use std::io::{self, Write};

use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::bridge::EventSink;
use crate::config::AgentConfig;
use crate::decode::WireRecord;
use crate::types::{LogEvent, LogKind, WorkerExit};

/// Placeholder for steps without a declared name.
pub const UNNAMED_STEP: &str = "Unnamed";

const UNNAMED_AGENT: &str = "agent";

/// The full event sequence for `config`.
pub fn script(config: &AgentConfig) -> Vec<LogEvent> {
    let name = config.name().unwrap_or(UNNAMED_AGENT);
    let steps = config.step_names();
    let total = steps.len();

    let mut events = Vec::with_capacity(total + 2);
    events.push(
        LogEvent::new(LogKind::Start, format!("Starting agent '{name}' with {total} step(s)"))
            .with_data(json!({ "agent": name, "steps": total, "stub": true })),
    );

    for (i, step) in steps.into_iter().enumerate() {
        let step_name = step.unwrap_or(UNNAMED_STEP);
        let index = i + 1;
        events.push(
            LogEvent::new(LogKind::Step, format!("Step {index}/{total}: {step_name}"))
                .with_data(json!({ "index": index, "total": total, "name": step_name })),
        );
    }

    events.push(
        LogEvent::new(LogKind::Complete, format!("Agent '{name}' completed"))
            .with_data(json!({ "agent": name, "steps": total })),
    );
    events
}

/// Play the script into `sink`, checking for a stop request between events.
pub async fn run(
    run_id: u64,
    config: &AgentConfig,
    sink: &EventSink,
    stop_rx: &mut oneshot::Receiver<()>,
) -> WorkerExit {
    for event in script(config) {
        match stop_rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => {}
            _ => {
                info!(run_id, "stop requested; interrupting stub run");
                return WorkerExit::Terminated;
            }
        }

        debug!(run_id, kind = %event.kind, "stub event");
        sink.emit(event).await;
        tokio::task::yield_now().await;
    }

    WorkerExit::Code(0)
}

/// Print the script as wire records, one per line.
pub fn write_wire<W: Write>(config: &AgentConfig, mut out: W) -> io::Result<()> {
    for event in script(config) {
        let line = serde_json::to_string(&WireRecord::from_event(&event))?;
        writeln!(out, "{line}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::parse_stdout_line;

    fn labels(events: &[LogEvent]) -> Vec<&str> {
        events.iter().map(|e| e.label()).collect()
    }

    #[test]
    fn steps_are_numbered_with_unnamed_placeholder() {
        let cfg = AgentConfig::parse(r#"{"steps":[{"name":"fetch"},{}]}"#).unwrap();
        let events = script(&cfg);

        assert_eq!(labels(&events), vec!["start", "step", "step", "complete"]);
        assert!(events[1].message.contains("1/2"));
        assert!(events[1].message.contains("fetch"));
        assert!(events[2].message.contains("2/2"));
        assert!(events[2].message.contains("Unnamed"));
        assert_eq!(events[2].data["name"], "Unnamed");
    }

    #[test]
    fn no_steps_is_start_then_complete() {
        let cfg = AgentConfig::parse(r#"{"name":"idle"}"#).unwrap();
        let events = script(&cfg);
        assert_eq!(labels(&events), vec!["start", "complete"]);
        assert!(events[0].message.contains("idle"));
    }

    #[test]
    fn wire_output_decodes_back_to_the_same_labels() {
        let cfg = AgentConfig::parse(r#"{"steps":[{"name":"a"},{"name":"b"}]}"#).unwrap();
        let mut out = Vec::new();
        write_wire(&cfg, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let decoded: Vec<LogEvent> = text.lines().map(parse_stdout_line).collect();
        assert_eq!(labels(&decoded), vec!["start", "step", "step", "complete"]);
        assert!(decoded.iter().all(|e| e.kind == LogKind::AgentEvent));
        assert_eq!(decoded[2].message, "Step 2/2: b");
    }

    #[tokio::test]
    async fn stop_before_first_event_interrupts() {
        let cfg = AgentConfig::parse(r#"{"steps":[{}]}"#).unwrap();
        let (sink, mut rx) = EventSink::channel(8);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        stop_tx.send(()).unwrap();

        let exit = run(1, &cfg, &sink, &mut stop_rx).await;
        assert_eq!(exit, WorkerExit::Terminated);
        assert!(rx.try_recv().is_err());
    }
}
