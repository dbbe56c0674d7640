//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_core::prelude::*;` to import all essential types.

// Identity
pub use crate::{ConversationKey, Session, SessionStore};

// Permissions
pub use crate::{
    AllowSource, ApprovalId, Behavior, DenyReason, HumanAction, PermissionDecision,
    PermissionRequest, PermissionResponse,
};

// Collaborators
pub use crate::{
    AgentEngine, AgentEvent, ApprovalRoute, ConsentPrompt, EngineRequest, EventSink, EventStream,
    MessageHandle, Notice, PromptChannel, PromptOutcome,
};

// Errors
pub use crate::{ChannelError, ChannelResult, EngineError, EngineResult};
