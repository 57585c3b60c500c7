// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{OrchestratorConfig, RawOrchestratorConfig};
use crate::errors::{AgentrunError, Result};

impl TryFrom<RawOrchestratorConfig> for OrchestratorConfig {
    type Error = AgentrunError;

    fn try_from(raw: RawOrchestratorConfig) -> std::result::Result<Self, Self::Error> {
        let grace_period = validate_supervisor(&raw)?;
        validate_runtime(&raw)?;
        Ok(OrchestratorConfig::new_unchecked(
            raw.runtime,
            grace_period,
            raw.supervisor.delivery,
            raw.supervisor.env_var,
        ))
    }
}

fn validate_supervisor(cfg: &RawOrchestratorConfig) -> Result<Duration> {
    let grace = parse_duration(&cfg.supervisor.grace_period).map_err(|e| {
        AgentrunError::ConfigError(format!("[supervisor].grace_period: {e}"))
    })?;

    if grace.is_zero() {
        return Err(AgentrunError::ConfigError(
            "[supervisor].grace_period must be greater than zero".to_string(),
        ));
    }

    let env_var = cfg.supervisor.env_var.trim();
    if env_var.is_empty() || env_var.contains('=') {
        return Err(AgentrunError::ConfigError(format!(
            "[supervisor].env_var is not a valid variable name: '{}'",
            cfg.supervisor.env_var
        )));
    }

    Ok(grace)
}

fn validate_runtime(cfg: &RawOrchestratorConfig) -> Result<()> {
    if cfg.runtime.candidates.is_empty() && !cfg.runtime.allow_stub {
        return Err(AgentrunError::ConfigError(
            "[runtime].candidates is empty and allow_stub = false; nothing could ever run"
                .to_string(),
        ));
    }

    if let Some(interp) = &cfg.runtime.interpreter {
        if interp.trim().is_empty() {
            return Err(AgentrunError::ConfigError(
                "[runtime].interpreter must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60),
        "h" => scaled_secs(value, 60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn scaled_secs(value: u64, factor: u64) -> std::result::Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration too large".to_string())
}
