// src/resolver.rs

//! Runtime resolution: pick the worker entry point from an ordered list of
//! candidate paths.
//!
//! Resolution is synchronous and only stats paths. A candidate whose stat
//! fails for any reason (missing, permission denied, broken symlink, ...)
//! counts as absent and probing moves on to the next one.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::OrchestratorConfig;
use crate::fs::FileSystem;

/// A resolved worker entry point plus how to launch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    /// The candidate that exists, joined onto the base directory.
    pub path: PathBuf,
    pub interpreter: Option<String>,
    pub args: Vec<String>,
}

impl RuntimeTarget {
    /// Program to execute: the interpreter if any, else the entry point.
    pub fn program(&self) -> String {
        match &self.interpreter {
            Some(interp) => interp.clone(),
            None => self.path.display().to_string(),
        }
    }

    /// Full argv after the program.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        if self.interpreter.is_some() {
            argv.push(self.path.display().to_string());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for RuntimeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program())?;
        for arg in self.argv() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Ordered candidate list and the directory relative entries live in.
#[derive(Debug, Clone)]
pub struct RuntimeResolver {
    candidates: Vec<PathBuf>,
    base_dir: PathBuf,
    interpreter: Option<String>,
    args: Vec<String>,
}

impl RuntimeResolver {
    pub fn new(candidates: Vec<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            candidates,
            base_dir: base_dir.into(),
            interpreter: None,
            args: Vec::new(),
        }
    }

    pub fn from_config(cfg: &OrchestratorConfig) -> Self {
        Self::new(cfg.runtime.candidates.clone(), cfg.base_dir())
            .with_launch(cfg.runtime.interpreter.clone(), cfg.runtime.args.clone())
    }

    /// Set how a resolved entry point is launched.
    pub fn with_launch(mut self, interpreter: Option<String>, args: Vec<String>) -> Self {
        self.interpreter = interpreter;
        self.args = args;
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Candidate paths as they are actually probed.
    pub fn probe_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.candidates.iter().map(|c| self.absolute(c))
    }

    /// Return the first candidate that exists, or `None`.
    pub fn resolve(&self, fs: &dyn FileSystem) -> Option<RuntimeTarget> {
        for path in self.probe_paths() {
            match fs.probe(&path) {
                Ok(kind) => {
                    info!(path = %path.display(), ?kind, "resolved agent runtime");
                    return Some(RuntimeTarget {
                        path,
                        interpreter: self.interpreter.clone(),
                        args: self.args.clone(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "runtime candidate does not exist");
                }
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        error = %e,
                        "runtime candidate could not be probed; treating as absent"
                    );
                }
            }
        }

        debug!(base_dir = %self.base_dir.display(), "no runtime candidate found");
        None
    }

    /// Human-readable list of what was searched, for error messages.
    pub fn describe(&self) -> String {
        self.probe_paths()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn absolute(&self, candidate: &Path) -> PathBuf {
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }
}
