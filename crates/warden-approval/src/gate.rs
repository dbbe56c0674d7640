//! The approval gate.
//!
//! Turns a sandboxed tool's consent request into a decision: either an
//! immediate allow from [`ApprovalMemory`] or a prompt posted to a human,
//! parked until approve, deny, the deadline, or shutdown, whichever comes
//! first.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use warden_core::{
    AllowSource, ApprovalId, ConsentPrompt, DenyReason, HumanAction, MessageHandle,
    PermissionDecision, PermissionRequest, PromptChannel, PromptOutcome,
};

use crate::error::{ApprovalError, ApprovalResult};
use crate::memory::ApprovalMemory;
use crate::pending::{PendingApproval, PendingApprovals};
use crate::scope;

/// How long a prompt waits for a human before it is denied.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of delivering a human action to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The action settled a pending approval.
    Resolved,
    /// The id was unknown or already settled; nothing happened.
    AlreadySettled,
}

struct GateInner {
    channel: Arc<dyn PromptChannel>,
    memory: ApprovalMemory,
    pending: PendingApprovals,
    timeout: Duration,
}

/// Human-in-the-loop consent gate with directory-scoped memory.
///
/// Cloning yields another handle to the same gate.
#[derive(Clone)]
pub struct ApprovalGate {
    inner: Arc<GateInner>,
}

impl fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("pending", &self.inner.pending.len())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl ApprovalGate {
    /// Create a gate that prompts through `channel` and denies after `timeout`.
    #[must_use]
    pub fn new(channel: Arc<dyn PromptChannel>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(GateInner {
                channel,
                memory: ApprovalMemory::new(),
                pending: PendingApprovals::new(),
                timeout,
            }),
        }
    }

    /// Decide a consent request.
    ///
    /// Never fails: every failure mode is a [`PermissionDecision::Deny`]
    /// carrying its reason.
    pub async fn request(&self, request: PermissionRequest) -> PermissionDecision {
        if self.inner.pending.is_closed() {
            debug!(tool = %request.tool_name, "approval gate shut down, denying");
            return PermissionDecision::deny(DenyReason::Shutdown);
        }

        let directory = match request.directory() {
            Some(dir) => Some(scope::canonical_directory_async(dir).await),
            None => None,
        };
        if let Some(dir) = &directory
            && self.inner.memory.is_approved(dir, &request.tool_name)
        {
            if scope::targets_within_async(&request.input, dir).await {
                info!(
                    tool = %request.tool_name,
                    directory = %dir.display(),
                    "auto-approved from approval memory"
                );
                return PermissionDecision::Allow {
                    source: AllowSource::Remembered,
                };
            }
            info!(
                tool = %request.tool_name,
                directory = %dir.display(),
                "target outside remembered directory, prompting"
            );
        }

        self.prompt_human(request, directory).await
    }

    async fn prompt_human(
        &self,
        request: PermissionRequest,
        directory: Option<PathBuf>,
    ) -> PermissionDecision {
        let id = ApprovalId::new();
        let prompt = ConsentPrompt {
            approval_id: id,
            tool_name: request.tool_name.clone(),
            input: request.input,
            directory: directory.clone(),
            channel: request.channel,
            thread_ts: request.thread_ts,
            user: request.user,
        };
        let (tx, mut rx) = oneshot::channel();
        let entry = PendingApproval {
            responder: tx,
            prompt: prompt.clone(),
            handle: None,
            scope: directory.map(|dir| (dir, request.tool_name)),
            created_at: Instant::now(),
            timer: None,
        };
        if self.inner.pending.insert(id, entry).is_err() {
            return PermissionDecision::deny(DenyReason::Shutdown);
        }
        let timer = self.spawn_deadline(id);
        if !self.inner.pending.set_timer(&id, timer.clone()) {
            timer.abort();
        }

        info!(approval_id = %id, tool = %prompt.tool_name, "awaiting human approval");

        // A decision may land while the prompt is still being posted
        // (deadline or shutdown); stop waiting on the channel if so.
        let mut late_handle = None;
        tokio::select! {
            posted = self.inner.channel.post_prompt(&prompt) => match posted {
                Ok(handle) => {
                    if !self.inner.pending.set_handle(&id, handle.clone()) {
                        late_handle = Some(handle);
                    }
                },
                Err(e) => {
                    warn!(approval_id = %id, error = %e, "failed to post approval prompt");
                    if let Some(mut entry) = self.inner.pending.take(&id) {
                        if let Some(timer) = entry.timer.take() {
                            timer.abort();
                        }
                        let denied = PermissionDecision::deny(DenyReason::DeliveryFailed);
                        let _ = entry.complete(id, denied);
                    }
                },
            },
            decision = &mut rx => {
                return decision.unwrap_or(PermissionDecision::deny(DenyReason::Shutdown));
            },
        }

        let decision = rx
            .await
            .unwrap_or(PermissionDecision::deny(DenyReason::Shutdown));

        // Settled before we learned where the prompt was posted; the settler
        // could not update it, so reflect the outcome here.
        if let Some(handle) = late_handle {
            self.update_prompt(id, Some(handle), &prompt, &outcome_of(decision))
                .await;
        }
        decision
    }

    fn spawn_deadline(&self, id: ApprovalId) -> tokio::task::AbortHandle {
        let gate: Weak<GateInner> = Arc::downgrade(&self.inner);
        let timeout = self.inner.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = gate.upgrade() {
                ApprovalGate { inner }.expire(id).await;
            }
        })
        .abort_handle()
    }

    /// Deny an approval whose deadline elapsed. Runs on the deadline task.
    async fn expire(&self, id: ApprovalId) {
        let Some(entry) = self.inner.pending.take(&id) else {
            return;
        };
        info!(approval_id = %id, "approval request timed out");
        let (prompt, handle) = entry.complete(id, PermissionDecision::deny(DenyReason::Timeout));
        self.update_prompt(id, handle, &prompt, &PromptOutcome::TimedOut)
            .await;
    }

    /// Apply a human's answer to a pending approval.
    ///
    /// Approving remembers the tool for the request's directory before the
    /// decision is delivered. A second resolution of the same id is a no-op.
    pub async fn resolve(
        &self,
        id: ApprovalId,
        action: HumanAction,
        actor: Option<String>,
    ) -> Resolution {
        let Some(mut entry) = self.inner.pending.take(&id) else {
            debug!(approval_id = %id, "approval already settled or unknown");
            return Resolution::AlreadySettled;
        };
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        let (decision, outcome) = match action {
            HumanAction::Approve => {
                if let Some((dir, tool)) = &entry.scope {
                    self.inner.memory.remember(dir, tool);
                }
                (
                    PermissionDecision::Allow {
                        source: AllowSource::User,
                    },
                    PromptOutcome::Approved { actor },
                )
            },
            HumanAction::Deny => (
                PermissionDecision::deny(DenyReason::User),
                PromptOutcome::Denied { actor },
            ),
        };
        info!(approval_id = %id, tool = %entry.prompt.tool_name, outcome = %outcome, "approval resolved");

        let (prompt, handle) = entry.complete(id, decision);
        self.update_prompt(id, handle, &prompt, &outcome).await;
        Resolution::Resolved
    }

    /// [`resolve`](Self::resolve) with an id taken from an action callback.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidId`] if `id` is not an approval id.
    pub async fn resolve_str(
        &self,
        id: &str,
        action: HumanAction,
        actor: Option<String>,
    ) -> ApprovalResult<Resolution> {
        let id: ApprovalId = id
            .parse()
            .map_err(|_| ApprovalError::InvalidId(id.to_string()))?;
        Ok(self.resolve(id, action, actor).await)
    }

    /// Deny every pending approval and refuse new ones.
    ///
    /// Returns how many pending approvals were drained.
    pub async fn shutdown(&self) -> usize {
        let drained = self.inner.pending.close_and_drain();
        let count = drained.len();

        let mut to_update = Vec::with_capacity(count);
        for (id, mut entry) in drained {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            let (prompt, handle) =
                entry.complete(id, PermissionDecision::deny(DenyReason::Shutdown));
            to_update.push((id, prompt, handle));
        }
        for (id, prompt, handle) in to_update {
            self.update_prompt(id, handle, &prompt, &PromptOutcome::Shutdown)
                .await;
        }

        info!(drained = count, "approval gate shut down");
        count
    }

    /// Number of approvals awaiting a decision.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// The gate's approval memory.
    #[must_use]
    pub fn memory(&self) -> &ApprovalMemory {
        &self.inner.memory
    }

    /// Forget every remembered approval.
    pub fn reset_memory(&self) {
        self.inner.memory.clear();
    }

    async fn update_prompt(
        &self,
        id: ApprovalId,
        handle: Option<MessageHandle>,
        prompt: &ConsentPrompt,
        outcome: &PromptOutcome,
    ) {
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = self
            .inner
            .channel
            .update_prompt(&handle, prompt, outcome)
            .await
        {
            warn!(approval_id = %id, error = %e, "failed to update approval prompt");
        }
    }
}

fn outcome_of(decision: PermissionDecision) -> PromptOutcome {
    match decision {
        PermissionDecision::Allow { .. } => PromptOutcome::Approved { actor: None },
        PermissionDecision::Deny {
            reason: DenyReason::User,
        } => PromptOutcome::Denied { actor: None },
        PermissionDecision::Deny {
            reason: DenyReason::Timeout,
        } => PromptOutcome::TimedOut,
        PermissionDecision::Deny { .. } => PromptOutcome::Shutdown,
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
