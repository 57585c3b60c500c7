// src/exec/mod.rs

//! Worker execution layer.
//!
//! - [`process`] spawns the worker with `tokio::process::Command`, delivers
//!   the configuration and handles termination / forced kill.
//! - [`runner`] supervises one spawned process: concurrent stdout/stderr
//!   draining and the wait-or-stop race.
//! - [`stub`] is the dependency-free fallback worker.

pub mod process;
pub mod runner;
pub mod stub;

pub use process::{spawn_worker, Delivery};
pub use runner::run_process;
