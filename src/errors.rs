// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only a few of these ever stop a run from starting (`ConfigMalformed`,
//! `RuntimeNotFound` with the stub disabled, `SpawnFailure`). Everything that
//! happens once a worker is running is reported as a `LogEvent` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentrunError {
    /// The orchestrator's own TOML configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The agent configuration document supplied by the controller is not
    /// a JSON object.
    #[error("Malformed agent config: {0}")]
    ConfigMalformed(String),

    #[error("No agent runtime found (searched: {0})")]
    RuntimeNotFound(String),

    #[error("Failed to spawn agent process '{program}': {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AgentrunError>;
