// src/types.rs

//! Shared value types: the `LogEvent` record that flows from workers to
//! observers, worker exit outcomes, and configuration delivery modes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminant of a [`LogEvent`].
///
/// Serialised in kebab-case (`"agent-event"`, `"stdout-raw"`, ...), which is
/// also the spelling used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    Info,
    Warn,
    Error,
    /// A structured record emitted by the worker itself.
    AgentEvent,
    Step,
    Start,
    Complete,
    Exit,
    /// A worker stdout line that was not a structured record.
    StdoutRaw,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Warn => "warn",
            LogKind::Error => "error",
            LogKind::AgentEvent => "agent-event",
            LogKind::Step => "step",
            LogKind::Start => "start",
            LogKind::Complete => "complete",
            LogKind::Exit => "exit",
            LogKind::StdoutRaw => "stdout-raw",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of observability emitted during a worker run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    /// The `type` the worker declared for an `agent-event`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl LogEvent {
    /// Build an orchestrator-side event stamped with the current time.
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: empty_object(),
            timestamp: Utc::now(),
            record_type: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogKind::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    /// The terminal event of a run.
    pub fn exit(exit: WorkerExit) -> Self {
        Self::new(LogKind::Exit, format!("agent process exited ({exit})"))
            .with_data(exit.to_data())
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Either the worker-declared record type or the kind itself.
    pub fn label(&self) -> &str {
        self.record_type.as_deref().unwrap_or(self.kind.as_str())
    }

    /// Decode the exit outcome carried by an `exit` event.
    pub fn worker_exit(&self) -> Option<WorkerExit> {
        if self.kind != LogKind::Exit {
            return None;
        }
        WorkerExit::from_data(&self.data)
    }
}

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The process exited on its own terms with this code.
    Code(i32),
    /// The process was ended by this signal (unix only).
    Signalled(i32),
    /// Ended by a termination request without an observable code or signal.
    Terminated,
    /// The supervisor force-killed the process after the grace period.
    Killed,
}

impl WorkerExit {
    pub fn is_success(self) -> bool {
        self == WorkerExit::Code(0)
    }

    /// Process exit status a controller should mirror.
    pub fn as_process_code(self) -> i32 {
        match self {
            WorkerExit::Code(code) => code,
            WorkerExit::Signalled(_) | WorkerExit::Terminated | WorkerExit::Killed => 1,
        }
    }

    pub fn to_data(self) -> Value {
        let code = match self {
            WorkerExit::Code(code) => Value::from(code),
            _ => Value::Null,
        };
        let signal = match self {
            WorkerExit::Signalled(signal) => Value::from(signal),
            _ => Value::Null,
        };
        serde_json::json!({
            "code": code,
            "signal": signal,
            "killed": self == WorkerExit::Killed,
        })
    }

    pub fn from_data(data: &Value) -> Option<Self> {
        if data.get("killed").and_then(Value::as_bool) == Some(true) {
            return Some(WorkerExit::Killed);
        }
        let signal = data
            .get("signal")
            .and_then(Value::as_i64)
            .and_then(|s| i32::try_from(s).ok());
        match (data.get("code")?, signal) {
            (Value::Null, Some(signal)) => Some(WorkerExit::Signalled(signal)),
            (Value::Null, None) => Some(WorkerExit::Terminated),
            (code, _) => code
                .as_i64()
                .and_then(|c| i32::try_from(c).ok())
                .map(WorkerExit::Code),
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Code(code) => write!(f, "code {code}"),
            WorkerExit::Signalled(signal) => write!(f, "signal {signal}"),
            WorkerExit::Terminated => f.write_str("terminated"),
            WorkerExit::Killed => f.write_str("killed"),
        }
    }
}

/// How the agent configuration reaches the worker.
///
/// - `Stdin`: written to the worker's stdin, which is then closed.
/// - `Env`: placed in an environment variable (see `env_var` in config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Stdin,
    Env,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdin" => Ok(DeliveryMode::Stdin),
            "env" => Ok(DeliveryMode::Env),
            other => Err(format!(
                "invalid delivery mode: {other} (expected \"stdin\" or \"env\")"
            )),
        }
    }
}
