//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges.

use std::net::{IpAddr, SocketAddr};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_admission(config)?;
    validate_approval(config)?;
    validate_sessions(config)?;
    validate_agent(config)?;
    validate_slack(config)?;
    validate_logging(config)?;
    Ok(())
}

/// Upper bound for the global concurrency cap.
const MAX_CONCURRENCY_UPPER_BOUND: usize = 256;

/// Upper bound for the approval deadline (one day).
const APPROVAL_TIMEOUT_UPPER_BOUND_SECS: u64 = 86_400;

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_admission(config: &Config) -> ConfigResult<()> {
    let a = &config.admission;
    if a.max_concurrency == 0 || a.max_concurrency > MAX_CONCURRENCY_UPPER_BOUND {
        return Err(invalid(
            "admission.max_concurrency",
            format!("max_concurrency must be between 1 and {MAX_CONCURRENCY_UPPER_BOUND}"),
        ));
    }
    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    let a = &config.approval;
    if a.timeout_secs == 0 || a.timeout_secs > APPROVAL_TIMEOUT_UPPER_BOUND_SECS {
        return Err(invalid(
            "approval.timeout_secs",
            format!("timeout_secs must be between 1 and {APPROVAL_TIMEOUT_UPPER_BOUND_SECS}"),
        ));
    }

    let is_loopback = a
        .bridge_host
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_loopback());
    if !is_loopback {
        return Err(invalid(
            "approval.bridge_host",
            format!(
                "bridge_host '{}' is not a loopback address; the approval bridge must never be exposed",
                a.bridge_host
            ),
        ));
    }
    Ok(())
}

fn validate_sessions(config: &Config) -> ConfigResult<()> {
    let s = &config.sessions;
    if s.idle_timeout_secs == 0 {
        return Err(invalid(
            "sessions.idle_timeout_secs",
            "idle_timeout_secs must be greater than 0",
        ));
    }
    if s.sweep_interval_secs == 0 {
        return Err(invalid(
            "sessions.sweep_interval_secs",
            "sweep_interval_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_agent(config: &Config) -> ConfigResult<()> {
    if config.agent.command.trim().is_empty() {
        return Err(invalid("agent.command", "command must not be empty"));
    }
    Ok(())
}

fn validate_slack(config: &Config) -> ConfigResult<()> {
    if config.slack.listen_addr.parse::<SocketAddr>().is_err() {
        return Err(invalid(
            "slack.listen_addr",
            format!(
                "listen_addr '{}' is not a valid socket address",
                config.slack.listen_addr
            ),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }
    Ok(())
}
