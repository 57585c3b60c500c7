// tests/bridge_runs.rs
//
// End-to-end runs through the bridge with real `sh` workers.

#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use agentrun::bridge::Bridge;
use agentrun::engine::{LifecycleState, RunMode};
use agentrun::fs::mock::MockFileSystem;
use agentrun::types::{DeliveryMode, LogKind, WorkerExit};
use agentrun_test_utils::builders::{AgentConfigBuilder, OrchestratorConfigBuilder};
use agentrun_test_utils::events::{collect_for, collect_until_exit, final_exit, labels, of_kind};
use agentrun_test_utils::scripts::ScriptDir;
use agentrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const QUIET: Duration = Duration::from_millis(300);

/// Bridge whose only candidate is `worker.sh` in `dir`, run through `sh`.
fn sh_bridge(dir: &ScriptDir, body: &str) -> Bridge {
    dir.shell("worker.sh", body);
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("worker.sh")
        .base_dir(dir.path())
        .interpreter("sh")
        .build();
    Bridge::new(&cfg)
}

async fn wait_idle(bridge: &Bridge) {
    with_timeout(async {
        while bridge.state() != LifecycleState::Idle {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn stop_when_idle_is_a_no_op() -> TestResult {
    init_tracing();
    let bridge = Bridge::new(&OrchestratorConfigBuilder::new().build());
    let mut sub = bridge.subscribe();

    let ack = bridge.stop().await;
    assert!(ack.success);
    assert_eq!(ack.message.as_deref(), Some("nothing to stop"));
    assert!(collect_for(&mut sub, QUIET).await.is_empty());
    assert_eq!(bridge.state(), LifecycleState::Idle);
    Ok(())
}

#[tokio::test]
async fn missing_runtime_falls_back_to_the_stub() -> TestResult {
    init_tracing();
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("./packages/agents-core/dist/index.js")
        .base_dir("/workspace")
        .build();
    let bridge = Bridge::with_filesystem(&cfg, Arc::new(MockFileSystem::new()));
    let mut sub = bridge.subscribe();

    let agent = AgentConfigBuilder::new("researcher").step("fetch").unnamed_step();
    let ack = bridge.run(&agent.to_json()).await;
    assert!(ack.success, "ack: {ack:?}");

    let events = collect_until_exit(&mut sub).await;
    assert_eq!(
        labels(&events),
        vec!["info", "start", "step", "step", "complete", "exit"]
    );
    assert!(events[0].message.contains("stub"));
    assert!(events[2].message.contains("1/2") && events[2].message.contains("fetch"));
    assert!(events[3].message.contains("2/2") && events[3].message.contains("Unnamed"));
    assert_eq!(final_exit(&events), WorkerExit::Code(0));

    wait_idle(&bridge).await;
    Ok(())
}

#[tokio::test]
async fn event_callback_sees_a_run_until_unsubscribed() -> TestResult {
    init_tracing();
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("./packages/agents-core/dist/index.js")
        .base_dir("/workspace")
        .build();
    let bridge = Bridge::with_filesystem(&cfg, Arc::new(MockFileSystem::new()));
    let mut sub = bridge.subscribe();

    let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    let id = bridge.on_event(move |event| {
        let _ = tx.send(event.label().to_string());
    });

    let agent = AgentConfigBuilder::new("watched").step("one").step("two");
    assert!(bridge.run(&agent.to_json()).await.success);
    collect_until_exit(&mut sub).await;

    let mut labels_seen = Vec::new();
    while labels_seen.last().map(String::as_str) != Some("exit") {
        let label = with_timeout(seen.recv()).await.ok_or("callback stopped early")?;
        labels_seen.push(label);
    }
    assert_eq!(
        labels_seen,
        vec!["info", "start", "step", "step", "complete", "exit"]
    );
    wait_idle(&bridge).await;

    assert!(bridge.unsubscribe(id));
    assert!(!bridge.unsubscribe(id));

    assert!(bridge.run(&agent.to_json()).await.success);
    let second = collect_until_exit(&mut sub).await;
    assert_eq!(final_exit(&second), WorkerExit::Code(0));

    // The detached callback task ends and drops its sender without
    // seeing anything from the second run.
    assert_eq!(with_timeout(seen.recv()).await, None);
    Ok(())
}

#[tokio::test]
async fn runtime_not_found_without_stub_is_reported() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("missing.js")
        .base_dir(dir.path())
        .allow_stub(false)
        .build();
    let bridge = Bridge::new(&cfg);
    let mut sub = bridge.subscribe();

    let ack = bridge.run(r#"{"name":"x"}"#).await;
    assert!(!ack.success);
    assert!(ack.error.unwrap_or_default().contains("No agent runtime found"));

    let events = collect_for(&mut sub, QUIET).await;
    assert_eq!(labels(&events), vec!["error"]);
    assert_eq!(bridge.state(), LifecycleState::Idle);
    Ok(())
}

#[tokio::test]
async fn malformed_config_never_starts_a_run() -> TestResult {
    init_tracing();
    let bridge = Bridge::new(&OrchestratorConfigBuilder::new().build());
    let mut sub = bridge.subscribe();

    for doc in ["[1,2,3]", "{not json", "\"name\""] {
        let ack = bridge.run(doc).await;
        assert!(!ack.success, "accepted {doc}");
        assert!(ack.error.unwrap_or_default().contains("Malformed agent config"));
    }

    let events = collect_for(&mut sub, QUIET).await;
    assert_eq!(of_kind(&events, LogKind::Error).len(), 3);
    assert!(bridge.current().is_none());
    Ok(())
}

#[tokio::test]
async fn spawn_failure_reports_one_error_and_returns_to_idle() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    dir.file("runner.js", "console.log('never runs')\n");
    // No interpreter and no execute bit: the OS refuses to spawn it.
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("runner.js")
        .base_dir(dir.path())
        .build();
    let bridge = Bridge::new(&cfg);
    let mut sub = bridge.subscribe();

    let ack = bridge.run(r#"{"name":"x"}"#).await;
    assert!(!ack.success);
    assert!(ack.error.unwrap_or_default().contains("Failed to spawn"));
    assert_eq!(bridge.state(), LifecycleState::Idle);

    let events = collect_for(&mut sub, QUIET).await;
    assert_eq!(labels(&events), vec!["error"]);
    Ok(())
}

#[tokio::test]
async fn worker_records_and_exit_code_are_forwarded() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let bridge = sh_bridge(
        &dir,
        r#"cat >/dev/null
echo '{"type":"start","message":"booting","data":{"tools":2}}'
echo 'not json at all'
echo 'warning: disk low' >&2
printf '{"type":"complete","message":"done"}'
exit 4"#,
    );
    let mut sub = bridge.subscribe();

    let ack = bridge.run(&AgentConfigBuilder::new("w").to_json()).await;
    assert!(ack.success);
    assert!(ack.run_id.is_some());

    let events = collect_until_exit(&mut sub).await;
    assert_eq!(events[0].kind, LogKind::Info);
    assert!(events[0].message.contains("worker.sh"));

    let stdout: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.kind, LogKind::AgentEvent | LogKind::StdoutRaw))
        .map(|e| (e.label().to_string(), e.message.clone()))
        .collect();
    assert_eq!(
        stdout,
        vec![
            ("start".to_string(), "booting".to_string()),
            ("stdout-raw".to_string(), "not json at all".to_string()),
            ("complete".to_string(), "done".to_string()),
        ]
    );
    let start = events.iter().find(|e| e.label() == "start").ok_or("no start record")?;
    assert_eq!(start.data["tools"], 2);
    assert!(
        of_kind(&events, LogKind::Error)
            .iter()
            .any(|e| e.message == "warning: disk low")
    );

    let exit = final_exit(&events);
    assert_eq!(exit, WorkerExit::Code(4));
    assert_eq!(exit.as_process_code(), 4);
    wait_idle(&bridge).await;
    Ok(())
}

#[tokio::test]
async fn config_is_delivered_on_stdin() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let bridge = sh_bridge(&dir, "cat; echo");
    let mut sub = bridge.subscribe();

    let agent = AgentConfigBuilder::new("stdin-agent").step("a");
    assert!(bridge.run(&agent.to_json()).await.success);

    let events = collect_until_exit(&mut sub).await;
    let raw = of_kind(&events, LogKind::StdoutRaw);
    assert_eq!(raw.len(), 1);
    let echoed: serde_json::Value = serde_json::from_str(&raw[0].message)?;
    assert_eq!(echoed, agent.to_value());
    Ok(())
}

#[tokio::test]
async fn config_is_delivered_through_the_environment() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    dir.shell("worker.sh", r#"printf '%s\n' "$AGENT_DOC""#);
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("worker.sh")
        .base_dir(dir.path())
        .interpreter("sh")
        .delivery(DeliveryMode::Env)
        .env_var("AGENT_DOC")
        .build();
    let bridge = Bridge::new(&cfg);
    let mut sub = bridge.subscribe();

    let agent = AgentConfigBuilder::new("env-agent");
    assert!(bridge.run(&agent.to_json()).await.success);

    let events = collect_until_exit(&mut sub).await;
    let raw = of_kind(&events, LogKind::StdoutRaw);
    assert_eq!(raw.len(), 1);
    let echoed: serde_json::Value = serde_json::from_str(&raw[0].message)?;
    assert_eq!(echoed["name"], "env-agent");
    Ok(())
}

#[tokio::test]
async fn cooperative_worker_stops_within_grace() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let bridge = sh_bridge(
        &dir,
        r#"echo '{"type":"start","message":"up"}'
sleep 30"#,
    );
    let mut sub = bridge.subscribe();

    assert!(bridge.run(r#"{"name":"sleepy"}"#).await.success);
    let info = bridge.current().ok_or("no active run")?;
    assert!(info.pid.is_some());
    assert!(matches!(info.mode, RunMode::Process(_)));

    // Wait for the worker to be up before stopping it.
    while sub.recv().await.map(|e| e.label() != "start").unwrap_or(false) {}
    assert_eq!(bridge.state(), LifecycleState::Running);

    let ack = with_timeout(bridge.stop()).await;
    assert!(ack.success);
    assert_eq!(ack.message.as_deref(), Some("agent stopped (signal 15)"));
    assert_eq!(bridge.state(), LifecycleState::Idle);

    let events = collect_until_exit(&mut sub).await;
    assert!(of_kind(&events, LogKind::Warn).is_empty());
    assert_eq!(final_exit(&events), WorkerExit::Signalled(15));
    Ok(())
}

#[tokio::test]
async fn stubborn_worker_is_killed_after_grace() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    dir.shell(
        "worker.sh",
        r#"trap '' TERM
echo '{"type":"start","message":"ignoring TERM"}'
while true; do sleep 1; done"#,
    );
    let cfg = OrchestratorConfigBuilder::new()
        .candidate("worker.sh")
        .base_dir(dir.path())
        .interpreter("sh")
        .grace_period("300ms")
        .build();
    let bridge = Bridge::new(&cfg);
    let mut sub = bridge.subscribe();

    assert!(bridge.run(r#"{"name":"stubborn"}"#).await.success);
    while sub.recv().await.map(|e| e.label() != "start").unwrap_or(false) {}

    let ack = with_timeout(bridge.stop()).await;
    assert_eq!(ack.message.as_deref(), Some("agent stopped (killed)"));

    let mut events = collect_until_exit(&mut sub).await;
    assert_eq!(of_kind(&events, LogKind::Warn).len(), 1);
    let exit = events.last().ok_or("no events")?;
    assert_eq!(exit.data["killed"], true);
    assert_eq!(exit.data["code"], serde_json::Value::Null);

    events.extend(collect_for(&mut sub, QUIET).await);
    assert_eq!(of_kind(&events, LogKind::Exit).len(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_stops_share_one_outcome() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let bridge = sh_bridge(&dir, "echo '{\"type\":\"start\",\"message\":\"up\"}'\nsleep 30");
    let mut sub = bridge.subscribe();

    assert!(bridge.run("{}").await.success);
    while sub.recv().await.map(|e| e.label() != "start").unwrap_or(false) {}

    let (a, b, c) =
        with_timeout(async { tokio::join!(bridge.stop(), bridge.stop(), bridge.stop()) }).await;
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert!(a.success);

    let mut events = collect_until_exit(&mut sub).await;
    events.extend(collect_for(&mut sub, QUIET).await);
    assert_eq!(of_kind(&events, LogKind::Exit).len(), 1);
    Ok(())
}

#[tokio::test]
async fn starting_again_reaps_the_previous_run_first() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let bridge = sh_bridge(&dir, "cat; echo; sleep 30");
    let mut sub = bridge.subscribe();

    let first = bridge.run(&AgentConfigBuilder::new("first").to_json()).await;
    let first_id = first.run_id.ok_or("first run has no id")?;
    while sub.recv().await.map(|e| e.kind != LogKind::StdoutRaw).unwrap_or(false) {}

    let second = bridge.run(&AgentConfigBuilder::new("second").to_json()).await;
    let second_id = second.run_id.ok_or("second run has no id")?;
    assert_ne!(first_id, second_id);

    let mut events = Vec::new();
    loop {
        let ev = with_timeout(sub.recv()).await.ok_or("stream closed")?;
        let done = ev.kind == LogKind::StdoutRaw;
        events.push(ev);
        if done {
            break;
        }
    }

    // Exactly: first run's exit, second run's info, second run's output.
    assert_eq!(labels(&events), vec!["exit", "info", "stdout-raw"]);
    assert_eq!(events[0].data["run_id"], first_id);
    assert_eq!(events[1].data["run_id"], second_id);
    assert!(events[2].message.contains("second"));

    bridge.shutdown().await;
    Ok(())
}
