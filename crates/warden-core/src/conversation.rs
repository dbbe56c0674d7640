//! Conversation identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a conversation: `(user, channel, thread)`.
///
/// This is the serialization unit for agent executions. Two requests with
/// the same key never run concurrently. Slack intake always sets the thread:
/// a reply uses its thread's root timestamp and a top-level message starts a
/// thread of its own, so each Slack thread is one conversation. A key
/// without a thread is only built by other callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    user: String,
    channel: String,
    thread: Option<String>,
}

impl ConversationKey {
    /// Build a key from its parts. An empty thread is treated as no thread.
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        channel: impl Into<String>,
        thread: Option<impl Into<String>>,
    ) -> Self {
        let thread = thread.map(Into::into).filter(|t: &String| !t.is_empty());
        Self {
            user: user.into(),
            channel: channel.into(),
            thread,
        }
    }

    /// The user who owns the conversation.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The channel the conversation lives in.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The thread timestamp, if the conversation is threaded.
    #[must_use]
    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.user,
            self.channel,
            self.thread.as_deref().unwrap_or("direct")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn display_uses_direct_for_unthreaded() {
        let key = ConversationKey::new("U1", "C1", None::<String>);
        assert_eq!(key.to_string(), "U1:C1:direct");
    }

    #[test]
    fn display_includes_thread() {
        let key = ConversationKey::new("U1", "C1", Some("1700000000.000100"));
        assert_eq!(key.to_string(), "U1:C1:1700000000.000100");
    }

    #[test]
    fn empty_thread_is_no_thread() {
        let a = ConversationKey::new("U1", "C1", Some(""));
        let b = ConversationKey::new("U1", "C1", None::<String>);
        assert_eq!(a, b);
        assert!(a.thread().is_none());
    }

    #[test]
    fn keys_differ_by_any_component() {
        let mut set = HashSet::new();
        set.insert(ConversationKey::new("U1", "C1", Some("t1")));
        set.insert(ConversationKey::new("U2", "C1", Some("t1")));
        set.insert(ConversationKey::new("U1", "C2", Some("t1")));
        set.insert(ConversationKey::new("U1", "C1", Some("t2")));
        set.insert(ConversationKey::new("U1", "C1", Some("t1")));
        assert_eq!(set.len(), 4);
    }
}
