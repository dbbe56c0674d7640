//! Mock chat channel collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use warden_core::{
    AgentEvent, ChannelError, ChannelResult, ConsentPrompt, ConversationKey, EventSink,
    MessageHandle, Notice, PromptChannel, PromptOutcome,
};

#[derive(Debug, Default)]
struct PromptState {
    posted: Mutex<Vec<ConsentPrompt>>,
    updates: Mutex<Vec<(MessageHandle, PromptOutcome)>>,
    fail_posts: AtomicBool,
    fail_updates: AtomicBool,
    next_ts: AtomicUsize,
    changed: Notify,
}

/// Mock [`PromptChannel`] that records every prompt and update.
///
/// Uses `std::sync::Mutex` internally so inspection helpers are usable
/// without awaiting.
#[derive(Debug, Clone, Default)]
pub struct MockPromptChannel {
    state: Arc<PromptState>,
}

impl MockPromptChannel {
    /// Create a channel that accepts every post and update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `post_prompt` fail.
    #[must_use]
    pub fn failing_posts(self) -> Self {
        self.state.fail_posts.store(true, Ordering::SeqCst);
        self
    }

    /// Make every subsequent `update_prompt` fail.
    #[must_use]
    pub fn failing_updates(self) -> Self {
        self.state.fail_updates.store(true, Ordering::SeqCst);
        self
    }

    /// Prompts posted so far, in order.
    #[must_use]
    pub fn posted(&self) -> Vec<ConsentPrompt> {
        self.state
            .posted
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Updates applied so far, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<(MessageHandle, PromptOutcome)> {
        self.state
            .updates
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Wait until at least `n` prompts have been posted.
    pub async fn wait_for_posts(&self, n: usize) {
        loop {
            let changed = self.state.changed.notified();
            if self.posted().len() >= n {
                return;
            }
            changed.await;
        }
    }

    /// Wait until at least `n` updates have been applied.
    pub async fn wait_for_updates(&self, n: usize) {
        loop {
            let changed = self.state.changed.notified();
            if self.updates().len() >= n {
                return;
            }
            changed.await;
        }
    }
}

#[async_trait]
impl PromptChannel for MockPromptChannel {
    async fn post_prompt(&self, prompt: &ConsentPrompt) -> ChannelResult<MessageHandle> {
        if self.state.fail_posts.load(Ordering::SeqCst) {
            return Err(ChannelError::Api("channel_not_found".to_string()));
        }
        let n = self.state.next_ts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.state.posted.lock() {
            guard.push(prompt.clone());
        }
        self.state.changed.notify_waiters();
        Ok(MessageHandle {
            channel: prompt.channel.clone(),
            ts: format!("1700000000.{n:06}"),
        })
    }

    async fn update_prompt(
        &self,
        handle: &MessageHandle,
        _prompt: &ConsentPrompt,
        outcome: &PromptOutcome,
    ) -> ChannelResult<()> {
        if self.state.fail_updates.load(Ordering::SeqCst) {
            self.state.changed.notify_waiters();
            return Err(ChannelError::Transport("connection reset".to_string()));
        }
        if let Ok(mut guard) = self.state.updates.lock() {
            guard.push((handle.clone(), outcome.clone()));
        }
        self.state.changed.notify_waiters();
        Ok(())
    }
}

/// A notice or event captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// An agent event.
    Event(ConversationKey, AgentEvent),
    /// A lifecycle notice.
    Notice(ConversationKey, Notice),
}

/// Mock [`EventSink`] that records everything delivered to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail (the deliveries are still recorded).
    #[must_use]
    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Agent events delivered for `key`.
    #[must_use]
    pub fn events_for(&self, key: &ConversationKey) -> Vec<AgentEvent> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Event(k, e) if &k == key => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Notices delivered for `key`.
    #[must_use]
    pub fn notices_for(&self, key: &ConversationKey) -> Vec<Notice> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Notice(k, n) if &k == key => Some(n),
                _ => None,
            })
            .collect()
    }

    fn record(&self, delivery: Delivery) -> ChannelResult<()> {
        if let Ok(mut guard) = self.deliveries.lock() {
            guard.push(delivery);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("sink offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, key: &ConversationKey, event: &AgentEvent) -> ChannelResult<()> {
        self.record(Delivery::Event(key.clone(), event.clone()))
    }

    async fn notify(&self, key: &ConversationKey, notice: Notice) -> ChannelResult<()> {
        self.record(Delivery::Notice(key.clone(), notice))
    }
}
