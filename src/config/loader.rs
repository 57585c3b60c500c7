// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{OrchestratorConfig, RawOrchestratorConfig};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Load an orchestrator config file and return the raw, unvalidated form.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for the
/// validated [`OrchestratorConfig`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawOrchestratorConfig> {
    load_from_path_with(&RealFileSystem, path)
}

/// Like [`load_from_path`], reading through `fs`.
pub fn load_from_path_with(
    fs: &dyn FileSystem,
    path: impl AsRef<Path>,
) -> Result<RawOrchestratorConfig> {
    let contents = fs.read_to_string(path.as_ref())?;
    let config: RawOrchestratorConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a config file from path and validate it.
///
/// Relative `base_dir` values are interpreted relative to the config file's
/// own directory, so a config can sit next to the runtime it describes.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<OrchestratorConfig> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;

    if let Some(dir) = config_dir(path) {
        let base = match raw.runtime.base_dir.take() {
            Some(b) if b.is_relative() => dir.join(b),
            Some(b) => b,
            None => dir,
        };
        raw.runtime.base_dir = Some(base);
    }

    OrchestratorConfig::try_from(raw)
}

/// Load the config the CLI should use.
///
/// - An explicit path must exist.
/// - Without one, `agentrun.toml` is used if present, else defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<OrchestratorConfig> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let path = default_config_path();
    if path.is_file() {
        load_and_validate(&path)
    } else {
        debug!(path = %path.display(), "no config file found; using defaults");
        Ok(OrchestratorConfig::default())
    }
}

/// Default config location: `agentrun.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("agentrun.toml")
}

fn config_dir(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(parent.to_path_buf()),
        _ => None,
    }
}
