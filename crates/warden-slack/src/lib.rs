//! Warden Slack - Slack as the chat surface of the warden gateway.
//!
//! This crate provides:
//! - [`SlackApi`]: a minimal Web API client (`chat.postMessage`, `chat.update`)
//! - [`SlackPromptChannel`]: consent prompts with approve/deny buttons
//! - [`SlackEventSink`]: agent output and queue notices in the thread
//! - [`router`]: signed callback endpoints for button clicks and the Events API
//!
//! # Security
//!
//! Every callback is verified with the app's signing secret (HMAC-SHA256,
//! constant-time compare, five-minute replay window) before its body is
//! parsed. The bot token is never logged.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod api;
pub mod blocks;
pub mod channel;
/// Error types and results for Slack operations.
pub mod error;
pub mod events;
pub mod interactive;
pub mod routes;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use api::SlackApi;
pub use channel::{SlackEventSink, SlackPromptChannel};
pub use error::{SlackError, SlackResult};
pub use routes::{ACTIONS_PATH, EVENTS_PATH, SlackState, router};
pub use verify::SignatureVerifier;
