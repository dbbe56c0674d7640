//! Warden Approval - Human-in-the-loop consent for sandboxed tool calls.
//!
//! This crate provides:
//! - [`ApprovalGate`]: turns a tool's consent request into a decision, either
//!   from memory or by prompting a human through a
//!   [`PromptChannel`](warden_core::PromptChannel)
//! - [`ApprovalMemory`]: process-lifetime `directory -> tools` approvals
//! - [`scope`]: canonical path containment checks for remembered approvals
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use warden_approval::ApprovalMemory;
//!
//! let memory = ApprovalMemory::new();
//! memory.remember(Path::new("/repo"), "Edit");
//! assert_eq!(memory.list_all().len(), 1);
//! memory.clear();
//! assert!(memory.list_all().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Error types and results for the approval gate.
pub mod error;
pub mod gate;
pub mod memory;
mod pending;
pub mod scope;

pub use error::{ApprovalError, ApprovalResult};
pub use gate::{ApprovalGate, DEFAULT_TIMEOUT, Resolution};
pub use memory::ApprovalMemory;
