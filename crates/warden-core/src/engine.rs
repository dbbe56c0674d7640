//! Agent engine collaborator.
//!
//! The engine turns a prompt into a lazy stream of typed events. Each call to
//! [`AgentEngine::stream`] is one execution; streams are not restartable.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::EngineResult;

/// Environment variable carrying the approval bridge URL.
pub const ENV_APPROVAL_URL: &str = "WARDEN_APPROVAL_URL";
/// Environment variable carrying the conversation channel.
pub const ENV_CHANNEL: &str = "WARDEN_CHANNEL";
/// Environment variable carrying the conversation thread.
pub const ENV_THREAD_TS: &str = "WARDEN_THREAD_TS";
/// Environment variable carrying the conversation user.
pub const ENV_USER: &str = "WARDEN_USER";
/// Environment variable carrying the execution working directory.
pub const ENV_WORKING_DIRECTORY: &str = "WARDEN_WORKING_DIRECTORY";

/// A typed event emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The engine opened or resumed a session.
    Init {
        /// Engine-side session identifier, reusable for the next request.
        session_id: String,
    },
    /// Assistant text.
    Text {
        /// The text chunk.
        text: String,
    },
    /// The agent invoked a tool.
    ToolUse {
        /// Tool name.
        name: String,
        /// Tool input.
        input: serde_json::Value,
    },
    /// The execution finished.
    Completed {
        /// Final result text, if any.
        result: Option<String>,
        /// Whether the engine reported the run as failed.
        is_error: bool,
    },
}

impl AgentEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Where the sandboxed tool process should send consent requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRoute {
    /// Full URL of the bridge's `/permission-request` endpoint.
    pub url: String,
    /// Conversation channel.
    pub channel: String,
    /// Conversation thread, if any.
    pub thread_ts: Option<String>,
    /// Conversation user.
    pub user: String,
    /// Working directory of the execution.
    pub working_directory: PathBuf,
}

impl ApprovalRoute {
    /// Environment variables to hand to the tool process.
    #[must_use]
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            (ENV_APPROVAL_URL, self.url.clone()),
            (ENV_CHANNEL, self.channel.clone()),
            (ENV_USER, self.user.clone()),
            (
                ENV_WORKING_DIRECTORY,
                self.working_directory.display().to_string(),
            ),
        ];
        if let Some(thread) = &self.thread_ts {
            env.push((ENV_THREAD_TS, thread.clone()));
        }
        env
    }

    /// Rebuild a route from variables written by [`ApprovalRoute::to_env`].
    ///
    /// # Errors
    ///
    /// Returns the name of the first required variable that is unset or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, &'static str> {
        let required = |name: &'static str| lookup(name).filter(|v| !v.is_empty()).ok_or(name);
        Ok(Self {
            url: required(ENV_APPROVAL_URL)?,
            channel: required(ENV_CHANNEL)?,
            thread_ts: lookup(ENV_THREAD_TS).filter(|v| !v.is_empty()),
            user: lookup(ENV_USER).unwrap_or_default(),
            working_directory: lookup(ENV_WORKING_DIRECTORY)
                .map(PathBuf::from)
                .unwrap_or_default(),
        })
    }
}

/// One execution request.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// User prompt.
    pub prompt: String,
    /// Engine session to resume, if the conversation already has one.
    pub resume_session: Option<String>,
    /// Working directory for the run.
    pub working_directory: PathBuf,
    /// Fired to abort the run.
    pub cancel: CancellationToken,
    /// Approval bridge routing for tool consent.
    pub approval: ApprovalRoute,
}

/// Stream of engine events for one execution.
pub type EventStream = BoxStream<'static, EngineResult<AgentEvent>>;

/// An automated coding agent.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Start one execution and stream its events.
    fn stream(&self, request: EngineRequest) -> EventStream;

    /// Destroy an engine-side session. Default: nothing to clean up.
    async fn end_session(&self, _session_id: &str) -> EngineResult<()> {
        Ok(())
    }
}
