//! Warden Permission - consent server launched by the agent CLI.
//!
//! `wardend` starts every agent execution with an MCP config pointing at the
//! `warden-permission` binary and `--permission-prompt-tool` naming its
//! `approve` tool. Each time the agent wants to run a tool that needs
//! consent it calls `approve`, which posts to the approval bridge named by
//! `WARDEN_APPROVAL_URL` and waits for the human's answer.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Error types and results for the consent server.
pub mod error;
pub mod forward;
pub mod server;

pub use error::{PermissionError, PermissionResult};
pub use forward::BridgeClient;
pub use server::{ConsentArgs, ConsentServer, PROMPT_TOOL, SERVER_NAME, decision_payload, mcp_config};
