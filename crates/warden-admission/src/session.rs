//! In-memory session store keyed by conversation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use warden_core::{ConversationKey, Session, SessionStore};

/// Maps conversations to their [`Session`].
///
/// Cloning a `SessionMap` creates a new handle to the same sessions.
#[derive(Debug, Clone)]
pub struct SessionMap {
    sessions: Arc<RwLock<HashMap<ConversationKey, Session>>>,
    working_directory: PathBuf,
}

impl SessionMap {
    /// Create an empty map whose new sessions run in `working_directory`.
    #[must_use]
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            working_directory: working_directory.into(),
        }
    }

    /// Remove a session, returning it if it existed.
    pub async fn remove(&self, key: &ConversationKey) -> Option<Session> {
        self.sessions.write().await.remove(key)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether there are no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for SessionMap {
    async fn get(&self, key: &ConversationKey) -> Option<Session> {
        self.sessions.read().await.get(key).cloned()
    }

    async fn create(&self, key: &ConversationKey) -> Session {
        let session = Session::new(key.clone(), self.working_directory.clone());
        let previous = self
            .sessions
            .write()
            .await
            .insert(key.clone(), session.clone());
        if previous.is_some() {
            tracing::debug!(conversation = %key, "replaced existing session");
        }
        session
    }

    async fn record_engine_session(&self, key: &ConversationKey, engine_session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(key) {
            session.engine_session_id = Some(engine_session_id.to_string());
            session.last_activity = Utc::now();
        }
    }

    async fn touch(&self, key: &ConversationKey) {
        if let Some(session) = self.sessions.write().await.get_mut(key) {
            session.last_activity = Utc::now();
        }
    }

    async fn cleanup_inactive(
        &self,
        idle: Duration,
        busy: &(dyn for<'k> Fn(&'k ConversationKey) -> bool + Sync),
    ) -> Vec<Session> {
        let now = Utc::now();
        let mut guard = self.sessions.write().await;
        let stale: Vec<ConversationKey> = guard
            .values()
            .filter(|s| s.is_idle(idle, now) && !busy(&s.key))
            .map(|s| s.key.clone())
            .collect();
        let removed: Vec<Session> = stale.iter().filter_map(|k| guard.remove(k)).collect();
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "cleaned up inactive sessions");
        }
        removed
    }
}
