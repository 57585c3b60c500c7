// src/config/mod.rs

//! Configuration for agentrun.
//!
//! Responsibilities:
//! - The orchestrator's TOML-backed settings (`model.rs`), loaded from disk
//!   (`loader.rs`) and validated (`validate.rs`).
//! - The opaque agent document the controller hands to `start` (`agent.rs`).

pub mod agent;
pub mod loader;
pub mod model;
pub mod validate;

pub use agent::AgentConfig;
pub use loader::{load_and_validate, load_from_path, load_from_path_with, load_or_default};
pub use model::{OrchestratorConfig, RawOrchestratorConfig, RuntimeSection, SupervisorSection};
pub use validate::parse_duration;
