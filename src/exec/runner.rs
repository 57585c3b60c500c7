// src/exec/runner.rs

//! Drives one spawned worker from spawn to reaping.

use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::bridge::EventSink;
use crate::decode::{drain, StreamKind};
use crate::types::{LogEvent, WorkerExit};

use super::process::{exit_from_status, terminate};

/// Watch a worker process until it exits or a stop is requested.
///
/// - stdout and stderr are drained concurrently by two tasks, each with its
///   own decoder, so a full pipe on one side never stalls the worker.
/// - If `stop_rx` fires (or its sender is dropped), the worker is asked to
///   terminate and killed after `grace`; a `warn` event is emitted when the
///   kill was needed.
/// - Remaining output is drained before this returns, but for at most
///   `grace` once the process is gone, since a grandchild may still hold
///   the pipes open.
///
/// Does not emit the `exit` event; the caller does, after this returns, so
/// that it follows every output line of the run.
pub async fn run_process(
    run_id: u64,
    mut child: Child,
    mut stop_rx: oneshot::Receiver<()>,
    grace: Duration,
    sink: EventSink,
) -> WorkerExit {
    let pid = child.id();
    let stdout = child
        .stdout
        .take()
        .map(|out| tokio::spawn(drain(out, StreamKind::Stdout, sink.clone())));
    let stderr = child
        .stderr
        .take()
        .map(|err| tokio::spawn(drain(err, StreamKind::Stderr, sink.clone())));

    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                let exit = exit_from_status(status);
                info!(run_id, pid, %exit, "agent process exited");
                exit
            }
            Err(e) => {
                error!(run_id, pid, error = %e, "failed waiting for agent process");
                sink.emit(LogEvent::error(format!("lost track of agent process: {e}"))).await;
                terminate(&mut child, grace).await.exit
            }
        },

        stop = &mut stop_rx => {
            match stop {
                Ok(()) => info!(run_id, pid, "stop requested; terminating agent process"),
                Err(_) => debug!(run_id, pid, "supervisor went away; terminating agent process"),
            }
            let termination = terminate(&mut child, grace).await;
            if termination.timed_out {
                sink.emit(LogEvent::warn(format!(
                    "agent did not exit within {} ms of the termination request; killed",
                    grace.as_millis()
                )))
                .await;
            }
            info!(run_id, pid, exit = %termination.exit, "agent process stopped");
            termination.exit
        }
    };

    finish_drains(run_id, stdout, stderr, grace).await;
    exit
}

async fn finish_drains(
    run_id: u64,
    mut stdout: Option<JoinHandle<usize>>,
    mut stderr: Option<JoinHandle<usize>>,
    limit: Duration,
) {
    let both = async {
        if let Some(task) = stdout.as_mut() {
            let _ = task.await;
        }
        if let Some(task) = stderr.as_mut() {
            let _ = task.await;
        }
    };

    if timeout(limit, both).await.is_err() {
        warn!(run_id, "worker pipes still open after exit; abandoning remaining output");
        for task in [stdout, stderr].into_iter().flatten() {
            task.abort();
        }
    }
}
