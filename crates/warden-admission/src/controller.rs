//! Admission controller.
//!
//! Serializes executions per conversation and caps how many run at once
//! across all conversations. Work that cannot start immediately waits in a
//! per-conversation FIFO queue and is dispatched when a slot frees up.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use warden_core::ConversationKey;

use crate::error::{AdmissionError, AdmissionResult};
use crate::execution::ExecutionOutcome;

/// Runs one admitted item to completion.
///
/// The controller guarantees that no two calls for the same key overlap
/// and that at most `max_concurrency` calls are in flight.
#[async_trait]
pub trait Executor<P>: Send + Sync + 'static {
    /// Execute `payload` for `key`, honoring `cancel`.
    async fn execute(
        &self,
        key: ConversationKey,
        payload: P,
        cancel: CancellationToken,
    ) -> ExecutionOutcome;
}

/// Admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionLimits {
    /// Global cap on concurrent executions. Values below 1 are raised to 1.
    pub max_concurrency: usize,
    /// Per-conversation queue bound; `0` means unbounded.
    pub max_queue_per_conversation: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_queue_per_conversation: 0,
        }
    }
}

/// What happened to a submitted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Execution started immediately.
    Started,
    /// The item waits in its conversation's queue.
    Queued {
        /// 1-based position in the conversation's queue.
        position: usize,
    },
    /// The conversation's queue is full; the item was dropped.
    Rejected {
        /// Queue depth at the time of rejection.
        depth: usize,
    },
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionStats {
    /// Executions in flight.
    pub active: usize,
    /// Items waiting across all conversations.
    pub queued: usize,
    /// Conversations with at least one waiting item.
    pub queued_conversations: usize,
    /// Configured global cap.
    pub max_concurrency: usize,
}

struct Queued<P> {
    payload: P,
    seq: u64,
}

struct State<P> {
    /// Conversations currently executing, with their cancellation signal.
    active: HashMap<ConversationKey, CancellationToken>,
    queues: HashMap<ConversationKey, VecDeque<Queued<P>>>,
    /// Keys of `queues` in the order their queue became non-empty.
    order: VecDeque<ConversationKey>,
    next_seq: u64,
    closed: bool,
}

impl<P> State<P> {
    fn queued(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    fn is_idle(&self) -> bool {
        self.active.is_empty() && self.queues.is_empty()
    }

    fn remove_queue(&mut self, key: &ConversationKey) -> Option<VecDeque<Queued<P>>> {
        self.order.retain(|k| k != key);
        self.queues.remove(key)
    }

    /// Pop the oldest item of the first queued conversation that is not
    /// already executing, and mark it active.
    fn dispatch_next(&mut self) -> Option<(ConversationKey, P, CancellationToken)> {
        let key = self
            .order
            .iter()
            .find(|k| !self.active.contains_key(*k))?
            .clone();
        let queue = self.queues.get_mut(&key)?;
        let item = queue.pop_front()?;
        if queue.is_empty() {
            self.remove_queue(&key);
        }
        debug!(conversation = %key, seq = item.seq, "dequeued request");
        let cancel = CancellationToken::new();
        self.active.insert(key.clone(), cancel.clone());
        Some((key, item.payload, cancel))
    }
}

struct Inner<P> {
    executor: Arc<dyn Executor<P>>,
    limits: AdmissionLimits,
    state: Mutex<State<P>>,
    idle: Notify,
}

/// Per-conversation serialization plus a global concurrency cap.
///
/// Cloning yields another handle to the same controller.
pub struct AdmissionController<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for AdmissionController<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Send + 'static> AdmissionController<P> {
    /// Create a controller that runs admitted items on `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor<P>>, limits: AdmissionLimits) -> Self {
        let limits = AdmissionLimits {
            max_concurrency: limits.max_concurrency.max(1),
            ..limits
        };
        Self {
            inner: Arc::new(Inner {
                executor,
                limits,
                state: Mutex::new(State {
                    active: HashMap::new(),
                    queues: HashMap::new(),
                    order: VecDeque::new(),
                    next_seq: 0,
                    closed: false,
                }),
                idle: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<P>> {
        self.inner.state.lock().unwrap_or_else(|e| {
            warn!("admission state lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Admit an item for `key`.
    ///
    /// Starts it immediately if the conversation is idle and a slot is free,
    /// otherwise appends it to the conversation's queue.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub fn submit(&self, key: ConversationKey, payload: P) -> AdmissionResult<Admission> {
        let mut state = self.state();
        if state.closed {
            return Err(AdmissionError::ShuttingDown);
        }

        let busy = state.active.contains_key(&key);
        if busy || state.active.len() >= self.inner.limits.max_concurrency {
            let depth = state.queues.get(&key).map_or(0, VecDeque::len);
            let bound = self.inner.limits.max_queue_per_conversation;
            if bound > 0 && depth >= bound {
                info!(conversation = %key, depth, "conversation queue full, rejecting");
                return Ok(Admission::Rejected { depth });
            }

            let seq = state.next_seq;
            state.next_seq = seq.wrapping_add(1);
            if !state.queues.contains_key(&key) {
                state.order.push_back(key.clone());
            }
            let queue = state.queues.entry(key.clone()).or_default();
            queue.push_back(Queued { payload, seq });
            let position = queue.len();
            let reason = if busy {
                "conversation busy"
            } else {
                "at capacity"
            };
            info!(conversation = %key, position, reason, "request queued");
            return Ok(Admission::Queued { position });
        }

        let cancel = CancellationToken::new();
        state.active.insert(key.clone(), cancel.clone());
        let active = state.active.len();
        drop(state);

        info!(conversation = %key, active, "request started");
        self.launch(key, payload, cancel);
        Ok(Admission::Started)
    }

    /// Run one execution on its own task and release its slot afterwards.
    fn launch(&self, key: ConversationKey, payload: P, cancel: CancellationToken) {
        let controller = self.clone();
        tokio::spawn(async move {
            let executor = Arc::clone(&controller.inner.executor);
            let run_key = key.clone();
            let run =
                tokio::spawn(async move { executor.execute(run_key, payload, cancel).await });
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(conversation = %key, error = %e, "execution task aborted");
                    ExecutionOutcome::Failed {
                        error: e.to_string(),
                    }
                },
            };
            controller.release(&key, &outcome);
        });
    }

    /// Free `key`'s slot after its execution finished and start at most one
    /// queued item in its place.
    ///
    /// Invoked once per execution by the task that ran it. Releasing a key
    /// that is not active changes nothing.
    pub(crate) fn release(&self, key: &ConversationKey, outcome: &ExecutionOutcome) {
        let mut state = self.state();
        if state.active.remove(key).is_none() {
            warn!(conversation = %key, "release for a conversation that is not active, ignoring");
            return;
        }
        info!(conversation = %key, outcome = %outcome, "execution finished");

        let next = if state.closed || state.active.len() >= self.inner.limits.max_concurrency {
            None
        } else {
            state.dispatch_next()
        };
        let idle = state.is_idle();
        drop(state);

        if let Some((next_key, payload, cancel)) = next {
            info!(conversation = %next_key, "starting queued request");
            self.launch(next_key, payload, cancel);
        }
        if idle {
            self.inner.idle.notify_waiters();
        }
    }

    /// Fire the cancellation signal of `key`'s running execution.
    ///
    /// The execution still releases its slot itself, with a cancelled
    /// outcome. Returns `false` if nothing is running for `key`.
    pub fn cancel(&self, key: &ConversationKey) -> bool {
        let state = self.state();
        match state.active.get(key) {
            Some(token) => {
                token.cancel();
                info!(conversation = %key, "execution cancelled");
                true
            },
            None => false,
        }
    }

    /// Drop every queued (not yet started) item for `key`.
    ///
    /// Returns how many items were dropped.
    pub fn clear_queue(&self, key: &ConversationKey) -> usize {
        let mut state = self.state();
        let dropped = state.remove_queue(key).map_or(0, |q| q.len());
        let idle = state.is_idle();
        drop(state);

        if dropped > 0 {
            info!(conversation = %key, dropped, "cleared conversation queue");
        }
        if idle {
            self.inner.idle.notify_waiters();
        }
        dropped
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> AdmissionStats {
        let state = self.state();
        AdmissionStats {
            active: state.active.len(),
            queued: state.queued(),
            queued_conversations: state.queues.len(),
            max_concurrency: self.inner.limits.max_concurrency,
        }
    }

    /// Whether an execution is running for `key`.
    #[must_use]
    pub fn is_active(&self, key: &ConversationKey) -> bool {
        self.state().active.contains_key(key)
    }

    /// Wait until nothing is running and nothing is queued.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.state().is_idle() {
                return;
            }
            idle.await;
        }
    }

    /// Refuse new work, discard every queue, and cancel every running
    /// execution.
    ///
    /// Returns how many queued items were discarded. Running executions
    /// release their slots as they observe cancellation.
    pub fn shutdown(&self) -> usize {
        let mut state = self.state();
        state.closed = true;
        let discarded = state.queued();
        state.queues.clear();
        state.order.clear();
        for token in state.active.values() {
            token.cancel();
        }
        let cancelled = state.active.len();
        let idle = state.is_idle();
        drop(state);

        info!(cancelled, discarded, "admission controller shut down");
        if idle {
            self.inner.idle.notify_waiters();
        }
        discarded
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
