// src/engine/supervisor.rs

//! The process supervisor: owns at most one worker run at a time.
//!
//! State lives in a single slot guarded by a short-lived mutex: the
//! lifecycle state plus the active run's handle. The handle is only ever
//! touched here; the monitor task spawned per run reports back through the
//! same slot when the worker is gone.
//!
//! Ordering across runs: a run's `exit` event is emitted only after both of
//! its output streams are drained, and `start` waits for the previous run's
//! exit before spawning, so two runs' events never interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::bridge::EventSink;
use crate::config::{AgentConfig, OrchestratorConfig};
use crate::errors::{AgentrunError, Result};
use crate::exec::{run_process, spawn_worker, stub, Delivery};
use crate::fs::FileSystem;
use crate::resolver::{RuntimeResolver, RuntimeTarget};
use crate::types::{DeliveryMode, LogEvent, WorkerExit};

use super::lifecycle::{Lifecycle, LifecycleState, Transition};

/// Identifier of one worker run, unique per supervisor.
pub type RunId = u64;

/// Knobs the supervisor needs from the orchestrator config.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub grace_period: Duration,
    pub delivery: DeliveryMode,
    pub env_var: String,
    pub allow_stub: bool,
}

impl From<&OrchestratorConfig> for SupervisorOptions {
    fn from(cfg: &OrchestratorConfig) -> Self {
        Self {
            grace_period: cfg.grace_period,
            delivery: cfg.delivery,
            env_var: cfg.env_var.clone(),
            allow_stub: cfg.runtime.allow_stub,
        }
    }
}

/// What a run is executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Process(RuntimeTarget),
    Stub,
}

/// Public view of the active run.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: RunId,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub mode: RunMode,
}

/// Result of [`Supervisor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NothingToStop,
    Stopped(WorkerExit),
}

/// The supervisor's handle on the active run.
struct ProcessHandle {
    info: RunInfo,
    /// Taken by the first stop request; the monitor signals at most once.
    stop_tx: Option<oneshot::Sender<()>>,
    /// Becomes `Some` once the run is reaped and its `exit` event emitted.
    done_rx: watch::Receiver<Option<WorkerExit>>,
}

#[derive(Default)]
struct Slot {
    lifecycle: Lifecycle,
    active: Option<ProcessHandle>,
}

type SharedSlot = Arc<Mutex<Slot>>;

pub struct Supervisor {
    resolver: RuntimeResolver,
    fs: Arc<dyn FileSystem>,
    options: SupervisorOptions,
    sink: EventSink,
    slot: SharedSlot,
    /// Serialises `start` calls.
    start_gate: tokio::sync::Mutex<()>,
    next_run: AtomicU64,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("resolver", &self.resolver)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        resolver: RuntimeResolver,
        fs: Arc<dyn FileSystem>,
        options: SupervisorOptions,
        sink: EventSink,
    ) -> Self {
        Self {
            resolver,
            fs,
            options,
            sink,
            slot: Arc::new(Mutex::new(Slot::default())),
            start_gate: tokio::sync::Mutex::new(()),
            next_run: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.slot).lifecycle.state()
    }

    /// Info about the active run, if any.
    pub fn current(&self) -> Option<RunInfo> {
        lock(&self.slot).active.as_ref().map(|h| h.info.clone())
    }

    /// Start a worker for `config`.
    ///
    /// Any active run is stopped and reaped first. Returns once the worker
    /// has been spawned (or the stub scheduled); events follow
    /// asynchronously through the sink.
    pub async fn start(&self, config: &AgentConfig) -> Result<RunId> {
        let _gate = self.start_gate.lock().await;

        if let Some(prev) = self.stop_active().await {
            info!(exit = %prev, "previous run stopped before starting a new one");
        }

        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        self.transition(Transition::Start);

        let mode = match self.resolver.resolve(self.fs.as_ref()) {
            Some(target) => RunMode::Process(target),
            None if self.options.allow_stub => RunMode::Stub,
            None => {
                let err = AgentrunError::RuntimeNotFound(self.resolver.describe());
                return Err(self.fail_start(run_id, err).await);
            }
        };

        match mode {
            RunMode::Process(target) => self.start_process(run_id, target, config).await,
            RunMode::Stub => self.start_stub(run_id, config),
        }
    }

    /// Stop the active run, if any.
    ///
    /// Concurrent callers share one termination: the worker is signalled
    /// once and every caller gets the same outcome.
    pub async fn stop(&self) -> StopOutcome {
        match self.stop_active().await {
            Some(exit) => StopOutcome::Stopped(exit),
            None => {
                debug!("stop requested but no agent is running");
                StopOutcome::NothingToStop
            }
        }
    }

    async fn start_process(
        &self,
        run_id: RunId,
        target: RuntimeTarget,
        config: &AgentConfig,
    ) -> Result<RunId> {
        let delivery = Delivery {
            mode: self.options.delivery,
            env_var: self.options.env_var.clone(),
            payload: config.to_bytes(),
        };

        let child = match spawn_worker(&target, delivery) {
            Ok(child) => child,
            Err(err) => return Err(self.fail_start(run_id, err).await),
        };

        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(None);
        let started = LogEvent::info(format!("Agent runner starting with runtime: {target}"))
            .with_data(serde_json::json!({
                "run_id": run_id,
                "pid": pid,
                "runtime": target.path.display().to_string(),
            }));

        // No await between spawn and handing the child to its monitor.
        self.install(run_id, pid, RunMode::Process(target), stop_tx, done_rx);

        let sink = self.sink.clone();
        let slot = Arc::clone(&self.slot);
        let grace = self.options.grace_period;
        tokio::spawn(async move {
            sink.emit(started).await;
            let exit = run_process(run_id, child, stop_rx, grace, sink.clone()).await;
            finish_run(&slot, &sink, run_id, exit, done_tx).await;
        });

        Ok(run_id)
    }

    fn start_stub(&self, run_id: RunId, config: &AgentConfig) -> Result<RunId> {
        warn!(
            run_id,
            searched = %self.resolver.describe(),
            "no agent runtime found; using built-in stub"
        );

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(None);

        self.install(run_id, None, RunMode::Stub, stop_tx, done_rx);

        let sink = self.sink.clone();
        let slot = Arc::clone(&self.slot);
        let config = config.clone();
        tokio::spawn(async move {
            sink.emit(LogEvent::info("No agent runtime found; running built-in stub")
                .with_data(serde_json::json!({ "run_id": run_id, "stub": true })))
                .await;
            let exit = stub::run(run_id, &config, &sink, &mut stop_rx).await;
            finish_run(&slot, &sink, run_id, exit, done_tx).await;
        });

        Ok(run_id)
    }

    /// Record the new handle and move to `Running`.
    fn install(
        &self,
        run_id: RunId,
        pid: Option<u32>,
        mode: RunMode,
        stop_tx: oneshot::Sender<()>,
        done_rx: watch::Receiver<Option<WorkerExit>>,
    ) {
        let mut guard = lock(&self.slot);
        let slot = &mut *guard;
        apply(&mut slot.lifecycle, Transition::Spawned);
        slot.active = Some(ProcessHandle {
            info: RunInfo {
                run_id,
                pid,
                started_at: Utc::now(),
                mode,
            },
            stop_tx: Some(stop_tx),
            done_rx,
        });
        info!(run_id, pid, "agent run is running");
    }

    /// Report a failed start: one `error` event, then back to `Idle`.
    async fn fail_start(&self, run_id: RunId, err: AgentrunError) -> AgentrunError {
        error!(run_id, error = %err, "agent run failed to start");
        self.transition(Transition::SpawnFailed);
        self.transition(Transition::FailureReported);
        self.sink
            .emit(LogEvent::error(err.to_string())
                .with_data(serde_json::json!({ "run_id": run_id })))
            .await;
        err
    }

    /// Signal the active run (once) and wait for it to be reaped.
    async fn stop_active(&self) -> Option<WorkerExit> {
        let (stop_tx, mut done_rx, run_id) = {
            let mut guard = lock(&self.slot);
            let slot = &mut *guard;
            let handle = slot.active.as_mut()?;
            let stop_tx = handle.stop_tx.take();
            if stop_tx.is_some() {
                apply(&mut slot.lifecycle, Transition::Stop);
            }
            (stop_tx, handle.done_rx.clone(), handle.info.run_id)
        };

        match stop_tx {
            Some(tx) => {
                info!(run_id, "stopping agent run");
                // Err means the monitor already finished; the wait below
                // still yields its outcome.
                let _ = tx.send(());
            }
            None => debug!(run_id, "stop already in progress; waiting for it"),
        }

        let exit = match done_rx.wait_for(Option::is_some).await {
            Ok(exit) => *exit,
            Err(_) => None,
        };
        Some(exit.unwrap_or_else(|| {
            warn!(run_id, "agent run monitor vanished without reporting an exit");
            WorkerExit::Terminated
        }))
    }

    fn transition(&self, transition: Transition) {
        apply(&mut lock(&self.slot).lifecycle, transition);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if let Some(tx) = slot.active.as_mut().and_then(|h| h.stop_tx.take()) {
            debug!("supervisor dropped with an active run; requesting stop");
            let _ = tx.send(());
        }
    }
}

/// Emit the run's `exit` event, return to `Idle`, and release waiters.
async fn finish_run(
    slot: &SharedSlot,
    sink: &EventSink,
    run_id: RunId,
    exit: WorkerExit,
    done_tx: watch::Sender<Option<WorkerExit>>,
) {
    sink.emit(LogEvent::exit(exit).with_data({
        let mut data = exit.to_data();
        data["run_id"] = serde_json::json!(run_id);
        data
    }))
    .await;

    {
        let mut guard = lock(slot);
        let slot = &mut *guard;
        if slot.active.as_ref().map(|h| h.info.run_id) == Some(run_id) {
            slot.active = None;
            apply(&mut slot.lifecycle, Transition::Exited);
        }
    }

    info!(run_id, %exit, "agent run finished");
    let _ = done_tx.send(Some(exit));
}

fn apply(lifecycle: &mut Lifecycle, transition: Transition) {
    if let Err(e) = lifecycle.apply(transition) {
        warn!(error = %e, "ignoring unexpected lifecycle transition");
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // The slot holds plain data; a panic elsewhere cannot leave it torn.
    slot.lock().unwrap_or_else(|e| e.into_inner())
}
