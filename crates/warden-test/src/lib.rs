//! Warden Test - Shared test utilities for the warden crates.
//!
//! Mock collaborators and fixtures used as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! warden-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use warden_test::{MockPromptChannel, test_permission_request};
//!
//! let channel = MockPromptChannel::new();
//! // ... hand `channel` to an ApprovalGate, then:
//! channel.wait_for_posts(1).await;
//! assert_eq!(channel.posted()[0].tool_name, "Bash");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod engine;
pub mod fixtures;
pub mod mocks;

pub use engine::{ScriptStep, ScriptedEngine};
pub use fixtures::*;
pub use mocks::*;
