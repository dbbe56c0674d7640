//! `warden-permission` - stdio MCP server started by the agent CLI.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing::info;

use warden_permission::{BridgeClient, ConsentServer};
use warden_telemetry::{LogConfig, LogTarget, setup_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the MCP protocol; logs go to stderr.
    let log_config = LogConfig::new("warn,warden=info")
        .with_target(LogTarget::Stderr)
        .without_ansi();
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let bridge = BridgeClient::from_env().context("missing approval route")?;
    info!(url = %bridge.route().url, channel = %bridge.route().channel, "consent server starting");

    let service = ConsentServer::new(bridge)
        .serve(stdio())
        .await
        .context("failed to start MCP service")?;
    service.waiting().await.context("MCP service failed")?;
    Ok(())
}
