use thiserror::Error;

use warden_core::ChannelError;

/// Errors raised while talking to Slack or handling its callbacks.
#[derive(Debug, Error)]
pub enum SlackError {
    /// The Web API answered `ok: false`.
    #[error("Slack API error: {0}")]
    Api(String),

    /// The HTTP call itself failed.
    #[error("Slack HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A signed request is missing a required header.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// The request timestamp is malformed or outside the replay window.
    #[error("stale or invalid request timestamp: {0}")]
    StaleTimestamp(String),

    /// The request signature does not match.
    #[error("request signature mismatch")]
    InvalidSignature,

    /// A callback body could not be interpreted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for Slack operations.
pub type SlackResult<T> = Result<T, SlackError>;

impl From<SlackError> for ChannelError {
    fn from(err: SlackError) -> Self {
        match err {
            SlackError::Api(msg) => Self::Api(msg),
            SlackError::Http(e) => Self::Transport(e.to_string()),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}
