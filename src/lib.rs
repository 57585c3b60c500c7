// src/lib.rs

pub mod bridge;
pub mod cli;
pub mod config;
pub mod decode;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod resolver;
pub mod types;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, Subscription};
use crate::cli::{CliArgs, Command};
use crate::config::{load_or_default, AgentConfig, OrchestratorConfig};
use crate::decode::WireRecord;
use crate::fs::RealFileSystem;
use crate::resolver::RuntimeResolver;
use crate::types::{LogEvent, WorkerExit};

/// How long to keep printing queued events after a rejected run.
const SETTLE: Duration = Duration::from_millis(200);

/// High-level entry point used by `main.rs`. Returns the process exit
/// code.
///
/// - `run` wires a [`Bridge`] to stdout and mirrors the worker's exit code
/// - `resolve` reports which entry point `run` would launch
/// - `stub-worker` plays the fallback script as a standalone worker
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(args.config.as_deref())?;
    debug!(?cfg, "orchestrator configuration loaded");

    match args.command {
        Command::Run { agent } => run_agent(&cfg, &agent).await,
        Command::Resolve => Ok(print_resolution(&cfg)),
        Command::StubWorker => stub_worker(&cfg).await,
    }
}

async fn run_agent(cfg: &OrchestratorConfig, agent: &Path) -> Result<i32> {
    let document = read_agent_document(agent).await?;

    let bridge = Bridge::new(cfg);
    let mut events = bridge.subscribe();

    let ack = bridge.run(&document).await;
    if !ack.success {
        warn!(error = ?ack.error, "agent run rejected");
        print_until_quiet(&mut events).await?;
        bridge.shutdown().await;
        return Ok(1);
    }
    info!(run_id = ?ack.run_id, "agent run started; streaming events");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let exit = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    print_event(&event)?;
                    if let Some(exit) = event.worker_exit() {
                        break exit;
                    }
                }
                None => break WorkerExit::Terminated,
            },

            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        info!("interrupt received; stopping agent");
                        let ack = bridge.stop().await;
                        debug!(?ack, "stop acknowledged");
                    }
                    Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
                }
            }
        }
    };

    bridge.shutdown().await;
    info!(%exit, "agent run finished");
    Ok(exit.as_process_code())
}

async fn read_agent_document(agent: &Path) -> Result<String> {
    if agent == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("reading agent config from stdin")?;
        return Ok(text);
    }

    tokio::fs::read_to_string(agent)
        .await
        .with_context(|| format!("reading agent config {}", agent.display()))
}

/// Print whatever is queued, stopping once nothing arrives for [`SETTLE`].
async fn print_until_quiet(events: &mut Subscription) -> Result<()> {
    while let Ok(Some(event)) = tokio::time::timeout(SETTLE, events.recv()).await {
        print_event(&event)?;
    }
    Ok(())
}

fn print_event(event: &LogEvent) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

fn print_resolution(cfg: &OrchestratorConfig) -> i32 {
    let resolver = RuntimeResolver::from_config(cfg);
    match resolver.resolve(&RealFileSystem) {
        Some(target) => {
            println!("{target}");
            0
        }
        None if cfg.runtime.allow_stub => {
            println!("stub (no runtime found; searched: {})", resolver.describe());
            0
        }
        None => {
            eprintln!("no agent runtime found (searched: {})", resolver.describe());
            1
        }
    }
}

/// Standalone fallback worker. The configuration comes from the configured
/// environment variable when set, otherwise from stdin.
async fn stub_worker(cfg: &OrchestratorConfig) -> Result<i32> {
    let text = match std::env::var(&cfg.env_var) {
        Ok(text) => text,
        Err(_) => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading agent config from stdin")?;
            text
        }
    };

    let stdout = std::io::stdout();
    match AgentConfig::parse(&text) {
        Ok(config) => {
            exec::stub::write_wire(&config, stdout.lock())?;
            Ok(0)
        }
        Err(e) => {
            let record = WireRecord::from_event(&LogEvent::error(e.to_string()));
            let mut out = stdout.lock();
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
            out.flush()?;
            Ok(1)
        }
    }
}
