//! Throwaway worker scripts on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A directory holding worker entry points. Removed on drop.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a `sh` script at `name` (relative to the directory) and make it
    /// executable.
    pub fn shell(&self, name: &str, body: &str) -> PathBuf {
        let path = self.file(name, &format!("#!/bin/sh\n{body}\n"));
        set_mode(&path, 0o755);
        path
    }

    /// Write a plain file without execute permission.
    pub fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create script parent dir");
        }
        fs::write(&path, contents).expect("write script");
        set_mode(&path, 0o644);
        path
    }
}

impl Default for ScriptDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod script");
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}
