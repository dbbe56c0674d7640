//! Events API callbacks: URL verification and inbound messages.

use serde::Deserialize;

use warden_core::ConversationKey;

/// Header Slack sets when it redelivers an event.
pub const RETRY_HEADER: &str = "x-slack-retry-num";

/// Outer envelope of an Events API callback.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Sent once when the request URL is configured.
    UrlVerification {
        /// Value to echo back.
        challenge: String,
    },
    /// A subscribed event.
    EventCallback {
        /// The event itself.
        event: Event,
    },
    /// Anything else (rate limiting notices, app lifecycle).
    #[serde(other)]
    Other,
}

/// The subset of a message-like event that intake looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    /// Event type (`message`, `app_mention`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Message subtype; edits, joins and bot posts all carry one.
    pub subtype: Option<String>,
    /// Set on messages posted by bots, including ourselves.
    pub bot_id: Option<String>,
    /// Author.
    pub user: Option<String>,
    /// Channel the message was posted in.
    pub channel: Option<String>,
    /// `im`, `channel`, `group` or `mpim`.
    pub channel_type: Option<String>,
    /// Message text.
    pub text: Option<String>,
    /// Message timestamp.
    pub ts: Option<String>,
    /// Parent thread, for replies.
    pub thread_ts: Option<String>,
}

/// An inbound prompt ready for admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intake {
    /// Conversation the prompt belongs to.
    pub key: ConversationKey,
    /// Prompt text with bot mentions stripped.
    pub prompt: String,
}

impl Event {
    /// Turn the event into a prompt, or `None` if it should be ignored.
    ///
    /// Mentions are taken from any channel; plain messages only from
    /// direct messages, since a channel mention also arrives as a
    /// `message` event. Replies stay in their thread; a top-level message
    /// starts a thread rooted at itself.
    #[must_use]
    pub fn intake(&self) -> Option<Intake> {
        let wanted = match self.kind.as_str() {
            "app_mention" => true,
            "message" => self.channel_type.as_deref() == Some("im"),
            _ => false,
        };
        if !wanted || self.bot_id.is_some() || self.subtype.is_some() {
            return None;
        }

        let user = self.user.as_deref()?;
        let channel = self.channel.as_deref()?;
        let thread = self.thread_ts.as_deref().or(self.ts.as_deref())?;
        let prompt = strip_mentions(self.text.as_deref().unwrap_or_default());
        if prompt.is_empty() {
            return None;
        }

        Some(Intake {
            key: ConversationKey::new(user, channel, Some(thread)),
            prompt,
        })
    }
}

/// Remove `<@U123>` user mentions and surrounding whitespace.
fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start.saturating_add(end).saturating_add(1)..],
            None => {
                rest = &rest[start..];
                break;
            },
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
