// src/engine/mod.rs

//! Supervision engine for agentrun.
//!
//! The pure lifecycle state machine lives in [`lifecycle`]; the async shell
//! that spawns, monitors and stops workers is [`supervisor`].

pub mod lifecycle;
pub mod supervisor;

pub use lifecycle::{InvalidTransition, Lifecycle, LifecycleState, Transition};
pub use supervisor::{RunId, RunInfo, RunMode, StopOutcome, Supervisor, SupervisorOptions};
