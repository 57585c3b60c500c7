// src/exec/process.rs

//! OS process plumbing for a worker: spawn with piped stdio, deliver the
//! configuration, ask it to terminate, and kill it when it will not.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{AgentrunError, Result};
use crate::resolver::RuntimeTarget;
use crate::types::{DeliveryMode, WorkerExit};

/// How the configuration document is handed to a freshly spawned worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub mode: DeliveryMode,
    pub env_var: String,
    pub payload: Vec<u8>,
}

/// Spawn the worker for `target`.
///
/// Returns as soon as the OS has created the process. With
/// [`DeliveryMode::Stdin`] the payload is written by a background task and
/// stdin is closed afterwards, so a large document never blocks the caller.
///
/// On unix the worker leads its own process group so that termination
/// reaches any helpers it forks.
pub fn spawn_worker(target: &RuntimeTarget, delivery: Delivery) -> Result<Child> {
    let program = target.program();
    let mut cmd = Command::new(&program);
    cmd.args(target.argv());

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match delivery.mode {
        DeliveryMode::Stdin => {
            // An inherited copy would shadow the document sent on stdin.
            cmd.stdin(Stdio::piped());
            cmd.env_remove(&delivery.env_var);
        }
        DeliveryMode::Env => {
            cmd.stdin(Stdio::null());
            cmd.env(
                &delivery.env_var,
                String::from_utf8_lossy(&delivery.payload).as_ref(),
            );
        }
    }

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| AgentrunError::SpawnFailure {
        program: program.clone(),
        source,
    })?;

    info!(
        program = %program,
        pid = child.id(),
        delivery = ?delivery.mode,
        "spawned agent process"
    );

    if delivery.mode == DeliveryMode::Stdin {
        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(write_payload(stdin, delivery.payload));
        }
    }

    Ok(child)
}

async fn write_payload(mut stdin: ChildStdin, payload: Vec<u8>) {
    if let Err(e) = stdin.write_all(&payload).await {
        // Typically EPIPE: the worker exited without reading its config.
        debug!(error = %e, "failed to write agent config to worker stdin");
        return;
    }
    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "failed to close worker stdin");
    }
    debug!(bytes = payload.len(), "agent config delivered on stdin");
}

/// Map an OS exit status onto a [`WorkerExit`].
pub fn exit_from_status(status: ExitStatus) -> WorkerExit {
    if let Some(code) = status.code() {
        return WorkerExit::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return WorkerExit::Signalled(signal);
        }
    }
    WorkerExit::Terminated
}

/// Outcome of [`terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub exit: WorkerExit,
    /// The grace period elapsed and the worker had to be killed.
    pub timed_out: bool,
}

/// Ask the worker to exit, wait up to `grace`, then kill it.
///
/// The process is always reaped before this returns.
pub async fn terminate(child: &mut Child, grace: Duration) -> Termination {
    request_termination(child).await;

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Termination {
            exit: exit_from_status(status),
            timed_out: false,
        },
        Ok(Err(e)) => {
            warn!(error = %e, "failed waiting for agent process after termination request");
            force_kill(child).await;
            Termination {
                exit: WorkerExit::Killed,
                timed_out: false,
            }
        }
        Err(_elapsed) => {
            warn!(
                pid = child.id(),
                grace_ms = grace.as_millis() as u64,
                "agent process ignored termination request; killing"
            );
            force_kill(child).await;
            Termination {
                exit: WorkerExit::Killed,
                timed_out: true,
            }
        }
    }
}

/// Deliver SIGTERM to the worker's process group.
#[cfg(unix)]
async fn request_termination(child: &Child) {
    let Some(pid) = child.id() else {
        debug!("agent process already reaped; nothing to signal");
        return;
    };

    match signal_group("TERM", pid).await {
        Ok(()) => debug!(pid, "sent SIGTERM to agent process group"),
        Err(e) => warn!(pid, error = %e, "failed to send SIGTERM to agent process"),
    }
}

/// Without POSIX signals there is no polite request; go straight to kill.
#[cfg(not(unix))]
async fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to terminate agent process");
    }
}

/// Kill the worker (and on unix its group) and reap it.
async fn force_kill(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        if let Err(e) = signal_group("KILL", pid).await {
            debug!(pid, error = %e, "failed to SIGKILL agent process group");
        }
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "kill on agent process failed; waiting for it instead");
        if let Err(e) = child.wait().await {
            warn!(error = %e, "failed to reap agent process");
        }
    }
}

#[cfg(unix)]
async fn signal_group(signal: &str, pid: u32) -> std::io::Result<()> {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{pid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!(
            "kill -{signal} exited with {status}"
        )))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> RuntimeTarget {
        RuntimeTarget {
            path: PathBuf::from("-c"),
            interpreter: Some("sh".to_string()),
            args: vec![script.to_string()],
        }
    }

    fn no_payload() -> Delivery {
        Delivery {
            mode: DeliveryMode::Stdin,
            env_var: "AGENT_CONFIG".to_string(),
            payload: Vec::new(),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let target = RuntimeTarget {
            path: PathBuf::from("/definitely/not/here/agent"),
            interpreter: None,
            args: Vec::new(),
        };
        match spawn_worker(&target, no_payload()) {
            Err(AgentrunError::SpawnFailure { program, .. }) => {
                assert_eq!(program, "/definitely/not/here/agent")
            }
            other => panic!("expected SpawnFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_codes_are_observed() {
        let mut child = spawn_worker(&sh("exit 7"), no_payload()).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_from_status(status), WorkerExit::Code(7));
    }

    #[tokio::test]
    async fn cooperative_worker_stops_within_grace() {
        let mut child = spawn_worker(&sh("exec sleep 30"), no_payload()).unwrap();
        let t = terminate(&mut child, Duration::from_secs(5)).await;
        assert!(!t.timed_out);
        assert_eq!(t.exit, WorkerExit::Signalled(15));
    }

    #[tokio::test]
    async fn death_by_signal_keeps_the_signal_number() {
        let mut child = spawn_worker(&sh("kill -KILL $$"), no_payload()).unwrap();
        let status = child.wait().await.unwrap();
        let exit = exit_from_status(status);
        assert_eq!(exit, WorkerExit::Signalled(9));
        assert_eq!(exit.to_data()["signal"], 9);
    }

    #[tokio::test]
    async fn stdin_delivery_hides_the_inherited_config_variable() {
        // HOME is set for the test process, so the worker would inherit it.
        assert!(std::env::var_os("HOME").is_some());
        let delivery = Delivery {
            mode: DeliveryMode::Stdin,
            env_var: "HOME".to_string(),
            payload: b"{}".to_vec(),
        };
        let child = spawn_worker(&sh(r#"printf '%s' "${HOME-unset}""#), delivery).unwrap();
        let output = child.wait_with_output().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "unset");
    }

    #[tokio::test]
    async fn env_delivery_sets_the_config_variable() {
        let delivery = Delivery {
            mode: DeliveryMode::Env,
            env_var: "AGENTRUN_TEST_CONFIG".to_string(),
            payload: br#"{"name":"x"}"#.to_vec(),
        };
        let child =
            spawn_worker(&sh(r#"printf '%s' "$AGENTRUN_TEST_CONFIG""#), delivery).unwrap();
        let output = child.wait_with_output().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), r#"{"name":"x"}"#);
    }

    #[tokio::test]
    async fn stubborn_worker_is_killed_after_grace() {
        let mut child =
            spawn_worker(&sh("trap '' TERM; exec sleep 30"), no_payload()).unwrap();
        // Give the shell a moment to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let t = terminate(&mut child, Duration::from_millis(300)).await;
        assert!(t.timed_out);
        assert_eq!(t.exit, WorkerExit::Killed);
        assert!(child.try_wait().unwrap().is_some(), "process must be reaped");
    }
}
