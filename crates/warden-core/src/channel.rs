//! Chat channel collaborator traits.
//!
//! Two roles are played by the chat platform:
//!
//! - [`PromptChannel`] posts consent prompts and later rewrites them to show
//!   the outcome.
//! - [`EventSink`] delivers agent output and lifecycle notices back into the
//!   conversation.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::conversation::ConversationKey;
use crate::engine::AgentEvent;
use crate::error::ChannelResult;
use crate::permission::ApprovalId;

/// Maximum characters of serialized tool input shown in a prompt.
const MAX_INPUT_PREVIEW: usize = 2_900;

/// Everything a channel needs to render a consent prompt.
#[derive(Debug, Clone)]
pub struct ConsentPrompt {
    /// Correlation token carried by the approve/deny actions.
    pub approval_id: ApprovalId,
    /// Tool the agent wants to run.
    pub tool_name: String,
    /// Tool input arguments.
    pub input: serde_json::Map<String, serde_json::Value>,
    /// Working directory of the execution, if known.
    pub directory: Option<PathBuf>,
    /// Channel to post into.
    pub channel: String,
    /// Thread to post into, if any.
    pub thread_ts: Option<String>,
    /// User to mention, if any.
    pub user: Option<String>,
}

impl ConsentPrompt {
    /// Pretty-printed tool input, truncated for display.
    #[must_use]
    pub fn input_preview(&self) -> String {
        let rendered = serde_json::to_string_pretty(&self.input).unwrap_or_default();
        if rendered.len() <= MAX_INPUT_PREVIEW {
            return rendered;
        }
        let mut cut = MAX_INPUT_PREVIEW;
        while !rendered.is_char_boundary(cut) {
            cut = cut.saturating_sub(1);
        }
        format!("{}\n…", &rendered[..cut])
    }
}

/// Platform handle of a posted prompt, used to update it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Channel the message was posted in.
    pub channel: String,
    /// Platform message identifier.
    pub ts: String,
}

/// Final state of a consent prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// A human approved.
    Approved {
        /// Who approved, if known.
        actor: Option<String>,
    },
    /// A human denied.
    Denied {
        /// Who denied, if known.
        actor: Option<String>,
    },
    /// Nobody answered in time.
    TimedOut,
    /// The service shut down first.
    Shutdown,
}

impl fmt::Display for PromptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved { actor: Some(a) } => write!(f, "Approved by <@{a}>"),
            Self::Approved { actor: None } => f.write_str("Approved"),
            Self::Denied { actor: Some(a) } => write!(f, "Denied by <@{a}>"),
            Self::Denied { actor: None } => f.write_str("Denied"),
            Self::TimedOut => f.write_str("Timed out"),
            Self::Shutdown => f.write_str("Cancelled (service shutting down)"),
        }
    }
}

/// Posts consent prompts and reflects their outcome.
#[async_trait]
pub trait PromptChannel: Send + Sync {
    /// Post a prompt with approve and deny actions.
    async fn post_prompt(&self, prompt: &ConsentPrompt) -> ChannelResult<MessageHandle>;

    /// Rewrite a posted prompt to show its outcome. Best-effort.
    async fn update_prompt(
        &self,
        handle: &MessageHandle,
        prompt: &ConsentPrompt,
        outcome: &PromptOutcome,
    ) -> ChannelResult<()>;
}

/// Lifecycle notices delivered to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The request waits behind others.
    Queued {
        /// 1-based position in the conversation's queue.
        position: usize,
    },
    /// The request was refused because the conversation's queue is full.
    Rejected {
        /// Queue depth at the time of rejection.
        depth: usize,
    },
    /// The execution failed.
    Failed,
    /// The execution was cancelled.
    Cancelled,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued { position } => {
                write!(f, "Your request is queued (position {position}).")
            },
            Self::Rejected { depth } => write!(
                f,
                "Too many pending requests in this conversation ({depth}). Try again later."
            ),
            Self::Failed => f.write_str("Something went wrong while running the agent."),
            Self::Cancelled => f.write_str("Request cancelled."),
        }
    }
}

/// Delivers agent output back into a conversation.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one agent event.
    async fn deliver(&self, key: &ConversationKey, event: &AgentEvent) -> ChannelResult<()>;

    /// Deliver a lifecycle notice.
    async fn notify(&self, key: &ConversationKey, notice: Notice) -> ChannelResult<()>;
}
