// src/decode/record.rs

//! Line to `LogEvent` conversion.
//!
//! Worker stdout lines are expected to be wire records:
//!
//! ```json
//! { "type": "step", "message": "Step 1/2: fetch", "data": {}, "timestamp": "..." }
//! ```
//!
//! Unknown fields are ignored and a missing `data` becomes `{}`. Lines that
//! do not match that shape pass through as `stdout-raw`. Stderr lines are
//! never parsed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::types::{LogEvent, LogKind};

/// The wire shape of one worker record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl WireRecord {
    /// Render an event in wire form, as a worker would print it.
    pub fn from_event(event: &LogEvent) -> Self {
        Self {
            record_type: event.label().to_string(),
            message: event.message.clone(),
            data: Some(event.data.clone()),
            timestamp: Some(event.timestamp.to_rfc3339()),
        }
    }

    fn into_event(self) -> LogEvent {
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        LogEvent {
            kind: LogKind::AgentEvent,
            message: self.message,
            data: self.data.unwrap_or_else(|| Value::Object(Map::new())),
            timestamp,
            record_type: Some(self.record_type),
        }
    }
}

/// Decode one stdout line. Never fails: non-records become `stdout-raw`.
pub fn parse_stdout_line(line: &str) -> LogEvent {
    match serde_json::from_str::<WireRecord>(line) {
        Ok(record) => record.into_event(),
        Err(e) => {
            trace!(error = %e, "stdout line is not a wire record; passing through raw");
            LogEvent::new(LogKind::StdoutRaw, line)
        }
    }
}

/// Wrap one stderr line. Stderr is diagnostic text, never protocol.
pub fn stderr_line(line: &str) -> LogEvent {
    LogEvent::error(line)
}
