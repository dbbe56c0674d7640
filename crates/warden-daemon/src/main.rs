//! `wardend` - admits Slack conversations into a coding agent and holds the
//! agent's sensitive tool calls until a human approves them.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use warden_config::Config;
use warden_telemetry::{LogConfig, setup_logging};

mod daemon;
mod engine;
mod sweep;

/// Warden daemon - chat-driven agent gateway with human tool approval.
#[derive(Parser)]
#[command(name = "wardend")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file, layered over `~/.warden/config.toml`.
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level for warden crates (overrides `[logging].level`).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolved = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    let config = resolved.config;

    let mut log_config = LogConfig::from_section(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = format!("warn,warden={level}");
    }
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
    for file in &resolved.loaded_files {
        info!(file = %file, "loaded configuration file");
    }

    daemon::run(config).await
}
