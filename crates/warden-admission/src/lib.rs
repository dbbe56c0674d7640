//! Warden Admission - Admission control for agent executions.
//!
//! This crate provides:
//! - [`AdmissionController`]: per-conversation serialization, a global
//!   concurrency cap, and FIFO queueing per conversation
//! - [`AgentExecutor`] and [`ExecutionContext`]: run one prompt through the
//!   agent engine and stream its output into the conversation
//! - [`SessionMap`]: in-memory [`SessionStore`](warden_core::SessionStore)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod controller;
/// Error types and results for admission.
pub mod error;
pub mod execution;
pub mod session;

pub use controller::{Admission, AdmissionController, AdmissionLimits, AdmissionStats, Executor};
pub use error::{AdmissionError, AdmissionResult};
pub use execution::{AgentExecutor, ExecutionContext, ExecutionOutcome};
pub use session::SessionMap;
