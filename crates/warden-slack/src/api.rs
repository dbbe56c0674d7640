//! Minimal Slack Web API client for posting and rewriting messages.

use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blocks::Block;
use crate::error::{SlackError, SlackResult};

/// Production Web API root.
pub const API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
}

impl ApiResponse {
    fn into_result(self) -> SlackResult<Option<String>> {
        if self.ok {
            Ok(self.ts)
        } else {
            Err(SlackError::Api(
                self.error.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    blocks: &'a [Block],
}

#[derive(Serialize)]
struct UpdateMessage<'a> {
    channel: &'a str,
    ts: &'a str,
    text: &'a str,
    blocks: &'a [Block],
}

/// Bot-token authenticated Web API client.
#[derive(Clone)]
pub struct SlackApi {
    client: Client,
    token: String,
    base_url: String,
}

impl fmt::Debug for SlackApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackApi")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SlackApi {
    /// Client against the production API.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    /// Client against another API root.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &B,
    ) -> SlackResult<Option<String>> {
        debug!(method, "calling Slack API");
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let parsed: ApiResponse = response.json().await?;
        parsed.into_result()
    }

    /// Post a message, in a thread if `thread_ts` is set.
    ///
    /// Returns the new message's timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SlackError::Api`] if Slack rejects the call and
    /// [`SlackError::Http`] if it cannot be reached.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
        blocks: &[Block],
    ) -> SlackResult<String> {
        let body = PostMessage {
            channel,
            text,
            thread_ts,
            blocks,
        };
        self.call("chat.postMessage", &body)
            .await?
            .ok_or_else(|| SlackError::InvalidPayload("chat.postMessage returned no ts".into()))
    }

    /// Replace the text and blocks of an existing message.
    ///
    /// # Errors
    ///
    /// Returns [`SlackError::Api`] if Slack rejects the call and
    /// [`SlackError::Http`] if it cannot be reached.
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        blocks: &[Block],
    ) -> SlackResult<()> {
        let body = UpdateMessage {
            channel,
            ts,
            text,
            blocks,
        };
        self.call("chat.update", &body).await.map(|_| ())
    }
}
