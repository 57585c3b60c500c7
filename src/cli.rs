// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `agentrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agentrun",
    version,
    about = "Launch an agent worker process and stream its events.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the orchestrator config file (TOML).
    ///
    /// If omitted, `agentrun.toml` in the current directory is used when it
    /// exists; otherwise built-in defaults apply.
    #[arg(long, global = true, value_name = "PATH", env = "AGENTRUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AGENTRUN_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run an agent and print its events as JSON lines on stdout.
    Run {
        /// Agent configuration document (JSON). Use `-` for stdin.
        #[arg(value_name = "AGENT_JSON")]
        agent: PathBuf,
    },

    /// Print which runtime entry point would be used, without running it.
    Resolve,

    /// Act as the fallback worker: read the agent config and print the
    /// stub's wire records.
    #[command(hide = true)]
    StubWorker,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
