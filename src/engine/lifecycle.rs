// src/engine/lifecycle.rs

//! Pure lifecycle state machine for the supervisor.
//!
//! No Tokio, no processes: just the legal transitions, so the rules can be
//! unit tested in isolation and the supervisor can refuse impossible moves.
//!
//! ```text
//! Idle ──Start──► Starting ──Spawned──► Running ──Stop──► Stopping
//!  ▲                 │                     │                 │
//!  │            SpawnFailed              Exited            Exited
//!  │                 ▼                     │                 │
//!  └─FailureReported─ Failed               └───────► Idle ◄──┘
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Spawned,
    SpawnFailed,
    FailureReported,
    Stop,
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid lifecycle transition {transition:?} from {from}")]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub transition: Transition,
}

/// Current lifecycle state with checked transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == LifecycleState::Idle
    }

    /// Apply `transition`, returning the new state. On error the state is
    /// unchanged.
    pub fn apply(&mut self, transition: Transition) -> Result<LifecycleState, InvalidTransition> {
        use LifecycleState::*;
        use Transition::*;

        let next = match (self.state, transition) {
            (Idle, Start) => Starting,
            (Starting, Spawned) => Running,
            (Starting, SpawnFailed) => Failed,
            (Failed, FailureReported) => Idle,
            (Running, Stop) | (Stopping, Stop) => Stopping,
            (Running, Exited) | (Stopping, Exited) => Idle,
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };

        self.state = next;
        Ok(next)
    }
}
