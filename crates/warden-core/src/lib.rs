//! Warden Core - Foundation types and traits for the warden agent gateway.
//!
//! This crate provides:
//! - [`ConversationKey`], the unit of execution serialization
//! - [`Session`] and the [`SessionStore`] trait
//! - Permission wire types and the internal [`PermissionDecision`] variant
//! - Collaborator traits: [`PromptChannel`], [`EventSink`], [`AgentEngine`]
//! - Error types for channel and engine failures

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod channel;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod permission;
pub mod session;

pub use channel::{ConsentPrompt, EventSink, MessageHandle, Notice, PromptChannel, PromptOutcome};
pub use conversation::ConversationKey;
pub use engine::{AgentEngine, AgentEvent, ApprovalRoute, EngineRequest, EventStream};
pub use error::{ChannelError, ChannelResult, EngineError, EngineResult};
pub use permission::{
    AllowSource, ApprovalId, Behavior, DenyReason, HumanAction, PermissionDecision,
    PermissionRequest, PermissionResponse,
};
pub use session::{Session, SessionStore};
