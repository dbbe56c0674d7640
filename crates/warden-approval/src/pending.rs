//! Registry of approvals awaiting a human decision.
//!
//! Each entry owns the one-shot responder that completes the requester's
//! deferred response. Removing an entry is the only way to reach that
//! responder, so an id can be settled at most once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use warden_core::{ApprovalId, ConsentPrompt, MessageHandle, PermissionDecision};

/// A consent request parked until approve, deny, timeout, or shutdown.
pub(crate) struct PendingApproval {
    /// Completes the requester's deferred response.
    pub(crate) responder: oneshot::Sender<PermissionDecision>,
    /// What was shown to the human.
    pub(crate) prompt: ConsentPrompt,
    /// Where the prompt was posted, once the channel has answered.
    pub(crate) handle: Option<MessageHandle>,
    /// `(canonical directory, tool)` to remember on approval.
    pub(crate) scope: Option<(PathBuf, String)>,
    pub(crate) created_at: Instant,
    /// Deadline task; aborted when the entry is settled some other way.
    pub(crate) timer: Option<AbortHandle>,
}

impl PendingApproval {
    /// Deliver `decision` to the requester and hand back what is needed to
    /// update the posted prompt.
    pub(crate) fn complete(
        self,
        id: ApprovalId,
        decision: PermissionDecision,
    ) -> (ConsentPrompt, Option<MessageHandle>) {
        if self.responder.send(decision).is_err() {
            tracing::debug!(approval_id = %id, "requester went away before the decision");
        }
        tracing::debug!(
            approval_id = %id,
            waited_ms = u64::try_from(self.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "pending approval settled"
        );
        (self.prompt, self.handle)
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<ApprovalId, PendingApproval>,
    closed: bool,
}

/// Thread-safe map of pending approvals.
///
/// Every operation is a single critical section, so insert/take races
/// between the requester, the action callback, the deadline task, and
/// shutdown are resolved by whoever takes the entry first.
#[derive(Default)]
pub(crate) struct PendingApprovals {
    inner: Mutex<Registry>,
}

impl PendingApprovals {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|e| {
            tracing::warn!("pending approval registry lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Park an entry. Hands it back if the registry has been closed.
    pub(crate) fn insert(
        &self,
        id: ApprovalId,
        entry: PendingApproval,
    ) -> Result<(), PendingApproval> {
        let mut registry = self.lock();
        if registry.closed {
            return Err(entry);
        }
        registry.entries.insert(id, entry);
        Ok(())
    }

    /// Remove and return an entry. `None` if it was already settled.
    pub(crate) fn take(&self, id: &ApprovalId) -> Option<PendingApproval> {
        self.lock().entries.remove(id)
    }

    /// Attach the posted message handle. Returns `false` if the entry is gone.
    pub(crate) fn set_handle(&self, id: &ApprovalId, handle: MessageHandle) -> bool {
        match self.lock().entries.get_mut(id) {
            Some(entry) => {
                entry.handle = Some(handle);
                true
            },
            None => false,
        }
    }

    /// Attach the deadline task. Returns `false` if the entry is gone.
    pub(crate) fn set_timer(&self, id: &ApprovalId, timer: AbortHandle) -> bool {
        match self.lock().entries.get_mut(id) {
            Some(entry) => {
                entry.timer = Some(timer);
                true
            },
            None => false,
        }
    }

    /// Refuse further inserts and remove every entry.
    pub(crate) fn close_and_drain(&self) -> Vec<(ApprovalId, PendingApproval)> {
        let mut registry = self.lock();
        registry.closed = true;
        registry.entries.drain().collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
