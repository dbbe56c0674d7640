//! Warden Bridge - Loopback HTTP bridge for tool consent requests.
//!
//! Sandboxed tool processes `POST /permission-request` with the tool name
//! and input; the request is held open until the
//! [`ApprovalGate`](warden_approval::ApprovalGate) decides, then answered with
//! `{behavior, message}`.
//!
//! # Example
//!
//! ```rust,ignore
//! let bridge = ApprovalBridge::bind(gate, "127.0.0.1".parse()?, 0).await?;
//! std::env::set_var("WARDEN_APPROVAL_URL", bridge.url());
//! // ...
//! bridge.shutdown().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Error types and results for the bridge.
pub mod error;
pub mod routes;
pub mod server;

pub use error::{BridgeError, BridgeResult};
pub use routes::{PERMISSION_PATH, router};
pub use server::ApprovalBridge;
