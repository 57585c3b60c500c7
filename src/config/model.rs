// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::DeliveryMode;

/// Default entry points probed when the config does not list any.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "./packages/agents-core/dist/index.js",
    "./packages/agents-openai/dist/index.js",
    "./node_modules/@openai/agents/dist/index.js",
];

pub const DEFAULT_ENV_VAR: &str = "AGENT_CONFIG";

/// Orchestrator configuration as read from a TOML file.
///
/// ```toml
/// [runtime]
/// candidates = ["./packages/agents-core/dist/index.js"]
/// base_dir = "."
/// interpreter = "node"
/// allow_stub = true
///
/// [supervisor]
/// grace_period = "5s"
/// delivery = "stdin"
/// ```
///
/// Both sections are optional and have reasonable defaults. This is the
/// unvalidated form; see [`OrchestratorConfig`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawOrchestratorConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// `[runtime]` section: where the worker entry point lives and how to launch
/// it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Ordered candidate entry points. First existing one wins.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,

    /// Directory that relative candidates are resolved against.
    ///
    /// If `None`, the current working directory is used.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Program used to run the entry point (e.g. `node` for a `.js` file).
    ///
    /// If `None`, the entry point is executed directly.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Extra arguments appended after the entry point.
    #[serde(default)]
    pub args: Vec<String>,

    /// Fall back to the built-in stub when no candidate exists.
    #[serde(default = "default_allow_stub")]
    pub allow_stub: bool,
}

fn default_candidates() -> Vec<PathBuf> {
    DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect()
}

fn default_allow_stub() -> bool {
    true
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            base_dir: None,
            interpreter: None,
            args: Vec::new(),
            allow_stub: default_allow_stub(),
        }
    }
}

/// `[supervisor]` section: process lifecycle knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    /// How long to wait after asking the worker to terminate before killing
    /// it, e.g. `"5s"` or `"500ms"`.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    /// `"stdin"` (default) or `"env"`.
    #[serde(default)]
    pub delivery: DeliveryMode,

    /// Environment variable used when `delivery = "env"`.
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

fn default_grace_period() -> String {
    "5s".to_string()
}

fn default_env_var() -> String {
    DEFAULT_ENV_VAR.to_string()
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            delivery: DeliveryMode::default(),
            env_var: default_env_var(),
        }
    }
}

/// Validated orchestrator configuration.
///
/// Produced from [`RawOrchestratorConfig`] via `TryFrom` (see
/// `validate.rs`), so the grace period is already a `Duration` here.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub runtime: RuntimeSection,
    pub grace_period: Duration,
    pub delivery: DeliveryMode,
    pub env_var: String,
}

impl OrchestratorConfig {
    pub(crate) fn new_unchecked(
        runtime: RuntimeSection,
        grace_period: Duration,
        delivery: DeliveryMode,
        env_var: String,
    ) -> Self {
        Self {
            runtime,
            grace_period,
            delivery,
            env_var,
        }
    }

    /// Base directory for relative candidates.
    pub fn base_dir(&self) -> PathBuf {
        match &self.runtime.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new_unchecked(
            RuntimeSection::default(),
            Duration::from_secs(5),
            DeliveryMode::default(),
            default_env_var(),
        )
    }
}
