//! Execution context for one agent invocation.
//!
//! Resolves the conversation's session, streams the engine's events into the
//! conversation, and reports how the run ended. Cancellation is observed
//! between events and always wins over further output.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use warden_core::{
    AgentEngine, AgentEvent, ApprovalRoute, ConversationKey, EngineRequest, EventSink, Notice,
    Session, SessionStore,
};

use crate::controller::Executor;

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The engine reached its terminal event.
    Completed,
    /// The engine failed while streaming.
    Failed {
        /// What went wrong, for logs only.
        error: String,
    },
    /// The execution's cancellation signal fired.
    Cancelled,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Bookkeeping for one in-flight agent invocation.
#[derive(Debug)]
pub struct ExecutionContext {
    key: ConversationKey,
    cancel: CancellationToken,
    started_at: Instant,
    events: usize,
}

impl ExecutionContext {
    /// Start tracking an execution for `key`.
    #[must_use]
    pub fn new(key: ConversationKey, cancel: CancellationToken) -> Self {
        Self {
            key,
            cancel,
            started_at: Instant::now(),
            events: 0,
        }
    }

    /// The conversation being executed.
    #[must_use]
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Whether the execution has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Events forwarded so far.
    #[must_use]
    pub fn events(&self) -> usize {
        self.events
    }
}

/// Runs prompts through an [`AgentEngine`] on behalf of the admission
/// controller.
pub struct AgentExecutor {
    engine: Arc<dyn AgentEngine>,
    sessions: Arc<dyn SessionStore>,
    sink: Arc<dyn EventSink>,
    approval_url: String,
}

impl fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("approval_url", &self.approval_url)
            .finish_non_exhaustive()
    }
}

impl AgentExecutor {
    /// Create an executor.
    ///
    /// `approval_url` is the full URL of the approval bridge endpoint handed
    /// to every execution.
    #[must_use]
    pub fn new(
        engine: Arc<dyn AgentEngine>,
        sessions: Arc<dyn SessionStore>,
        sink: Arc<dyn EventSink>,
        approval_url: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            sessions,
            sink,
            approval_url: approval_url.into(),
        }
    }

    async fn session_for(&self, key: &ConversationKey) -> Session {
        match self.sessions.get(key).await {
            Some(session) => session,
            None => {
                debug!(conversation = %key, "creating session");
                self.sessions.create(key).await
            },
        }
    }

    /// Drive one execution to its end.
    pub async fn run(&self, ctx: &mut ExecutionContext, prompt: String) -> ExecutionOutcome {
        let session = self.session_for(&ctx.key).await;
        let request = EngineRequest {
            prompt,
            resume_session: session.engine_session_id.clone(),
            working_directory: session.working_directory.clone(),
            cancel: ctx.cancel.clone(),
            approval: ApprovalRoute {
                url: self.approval_url.clone(),
                channel: ctx.key.channel().to_string(),
                thread_ts: ctx.key.thread().map(str::to_string),
                user: ctx.key.user().to_string(),
                working_directory: session.working_directory,
            },
        };
        info!(
            conversation = %ctx.key,
            resume = request.resume_session.is_some(),
            "starting agent execution"
        );

        let outcome = self.stream_events(ctx, request).await;

        match &outcome {
            ExecutionOutcome::Completed => {},
            ExecutionOutcome::Failed { error } => {
                warn!(conversation = %ctx.key, error = %error, "agent execution failed");
                self.notify(&ctx.key, Notice::Failed).await;
            },
            ExecutionOutcome::Cancelled => {
                self.notify(&ctx.key, Notice::Cancelled).await;
            },
        }
        info!(
            conversation = %ctx.key,
            outcome = %outcome,
            events = ctx.events,
            elapsed_ms = u64::try_from(ctx.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "agent execution ended"
        );
        outcome
    }

    async fn stream_events(
        &self,
        ctx: &mut ExecutionContext,
        request: EngineRequest,
    ) -> ExecutionOutcome {
        let cancel = ctx.cancel.clone();
        let mut stream = self.engine.stream(request);
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return ExecutionOutcome::Cancelled,
                next = stream.next() => next,
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    return ExecutionOutcome::Failed {
                        error: e.to_string(),
                    };
                },
                None => {
                    return ExecutionOutcome::Failed {
                        error: "engine stream ended without a result".to_string(),
                    };
                },
            };
            if cancel.is_cancelled() {
                return ExecutionOutcome::Cancelled;
            }

            ctx.events = ctx.events.saturating_add(1);
            if let AgentEvent::Init { session_id } = &event {
                self.sessions
                    .record_engine_session(&ctx.key, session_id)
                    .await;
            } else {
                self.sessions.touch(&ctx.key).await;
            }
            if let Err(e) = self.sink.deliver(&ctx.key, &event).await {
                warn!(conversation = %ctx.key, error = %e, "failed to deliver agent event");
            }
            if event.is_terminal() {
                return ExecutionOutcome::Completed;
            }
        }
    }

    async fn notify(&self, key: &ConversationKey, notice: Notice) {
        if let Err(e) = self.sink.notify(key, notice).await {
            warn!(conversation = %key, error = %e, "failed to deliver notice");
        }
    }
}

#[async_trait]
impl Executor<String> for AgentExecutor {
    async fn execute(
        &self,
        key: ConversationKey,
        prompt: String,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        let mut ctx = ExecutionContext::new(key, cancel);
        self.run(&mut ctx, prompt).await
    }
}
