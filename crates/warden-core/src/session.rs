//! Per-conversation session state.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::conversation::ConversationKey;

/// Session state for one conversation.
///
/// Created on the first request for a key, reused until garbage-collected
/// after an inactivity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Conversation this session belongs to.
    pub key: ConversationKey,
    /// Opaque engine-side session id, once the engine has reported one.
    pub engine_session_id: Option<String>,
    /// Working directory for executions in this conversation.
    pub working_directory: PathBuf,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last time any activity touched the session.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session.
    #[must_use]
    pub fn new(key: ConversationKey, working_directory: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            key,
            engine_session_id: None,
            working_directory,
            created_at: now,
            last_activity: now,
        }
    }

    /// Whether the session has been idle for at least `idle` as of `now`.
    #[must_use]
    pub fn is_idle(&self, idle: Duration, now: DateTime<Utc>) -> bool {
        let Ok(idle) = chrono::Duration::from_std(idle) else {
            return false;
        };
        now.signed_duration_since(self.last_activity) >= idle
    }
}

/// Storage for conversation sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up the session for a key.
    async fn get(&self, key: &ConversationKey) -> Option<Session>;

    /// Create (or replace) the session for a key.
    async fn create(&self, key: &ConversationKey) -> Session;

    /// Record the engine-side session id reported by the engine.
    async fn record_engine_session(&self, key: &ConversationKey, engine_session_id: &str);

    /// Mark the session as active now.
    async fn touch(&self, key: &ConversationKey);

    /// Remove and return every session idle for at least `idle`.
    ///
    /// Sessions whose key `busy` reports as running are kept regardless of
    /// their last activity.
    async fn cleanup_inactive(
        &self,
        idle: Duration,
        busy: &(dyn for<'k> Fn(&'k ConversationKey) -> bool + Sync),
    ) -> Vec<Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            ConversationKey::new("U1", "C1", None::<String>),
            PathBuf::from("/repo"),
        )
    }

    #[test]
    fn new_session_has_no_engine_id() {
        let s = session();
        assert!(s.engine_session_id.is_none());
        assert_eq!(s.created_at, s.last_activity);
    }

    #[test]
    fn idle_check() {
        let s = session();
        let later = s
            .last_activity
            .checked_add_signed(chrono::Duration::seconds(120))
            .unwrap();
        assert!(s.is_idle(Duration::from_secs(60), later));
        assert!(!s.is_idle(Duration::from_secs(600), later));
    }

    #[test]
    fn zero_idle_window_is_always_idle() {
        let s = session();
        assert!(s.is_idle(Duration::ZERO, s.last_activity));
    }
}
