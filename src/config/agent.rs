// src/config/agent.rs

//! The agent configuration document supplied by the controller.
//!
//! The orchestrator treats it as opaque: it must be a JSON object, it is
//! forwarded to the worker byte-for-byte as serialised here, and only the
//! stub peeks at `name` and `steps[].name`.

use serde_json::{Map, Value};

use crate::errors::{AgentrunError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    doc: Map<String, Value>,
}

impl AgentConfig {
    /// Parse a JSON document. Anything other than a JSON object is
    /// `ConfigMalformed`.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AgentrunError::ConfigMalformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(doc) => Ok(Self { doc }),
            other => Err(AgentrunError::ConfigMalformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Serialised form handed to the worker.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serialising a `Map<String, Value>` cannot fail.
        serde_json::to_vec(&self.doc).unwrap_or_default()
    }

    pub fn to_json_string(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    pub fn name(&self) -> Option<&str> {
        self.doc.get("name").and_then(Value::as_str)
    }

    /// Declared step names in order; `None` for steps without a string
    /// `name`.
    pub fn step_names(&self) -> Vec<Option<&str>> {
        match self.doc.get("steps") {
            Some(Value::Array(steps)) => steps
                .iter()
                .map(|s| s.get("name").and_then(Value::as_str))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.doc.clone())
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
