#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use agentrun::config::{AgentConfig, OrchestratorConfig, RawOrchestratorConfig};
use agentrun::types::DeliveryMode;

/// Builder for `OrchestratorConfig` to simplify test setup.
///
/// Starts with no candidates and a short grace period so tests never
/// depend on what happens to exist in the working directory.
pub struct OrchestratorConfigBuilder {
    raw: RawOrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        let mut raw = RawOrchestratorConfig::default();
        raw.runtime.candidates.clear();
        raw.supervisor.grace_period = "500ms".to_string();
        Self { raw }
    }

    pub fn candidate(mut self, path: impl AsRef<Path>) -> Self {
        self.raw.runtime.candidates.push(path.as_ref().to_path_buf());
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.runtime.base_dir = Some(dir.into());
        self
    }

    pub fn interpreter(mut self, program: &str) -> Self {
        self.raw.runtime.interpreter = Some(program.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.raw.runtime.args.push(arg.to_string());
        self
    }

    pub fn allow_stub(mut self, allow: bool) -> Self {
        self.raw.runtime.allow_stub = allow;
        self
    }

    pub fn grace_period(mut self, grace: &str) -> Self {
        self.raw.supervisor.grace_period = grace.to_string();
        self
    }

    pub fn delivery(mut self, mode: DeliveryMode) -> Self {
        self.raw.supervisor.delivery = mode;
        self
    }

    pub fn env_var(mut self, name: &str) -> Self {
        self.raw.supervisor.env_var = name.to_string();
        self
    }

    pub fn build(self) -> OrchestratorConfig {
        OrchestratorConfig::try_from(self.raw).expect("Failed to build valid config from builder")
    }
}

impl Default for OrchestratorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for agent documents.
pub struct AgentConfigBuilder {
    name: Option<String>,
    steps: Vec<Value>,
    extra: Vec<(String, Value)>,
}

impl AgentConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            steps: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn step(mut self, name: &str) -> Self {
        self.steps.push(json!({ "name": name }));
        self
    }

    pub fn unnamed_step(mut self) -> Self {
        self.steps.push(json!({}));
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.extra.push((key.to_string(), value));
        self
    }

    pub fn to_value(&self) -> Value {
        let mut doc = serde_json::Map::new();
        if let Some(name) = &self.name {
            doc.insert("name".to_string(), json!(name));
        }
        doc.insert("steps".to_string(), Value::Array(self.steps.clone()));
        for (k, v) in &self.extra {
            doc.insert(k.clone(), v.clone());
        }
        Value::Object(doc)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn build(self) -> AgentConfig {
        AgentConfig::from_value(self.to_value()).expect("builder always produces an object")
    }
}
