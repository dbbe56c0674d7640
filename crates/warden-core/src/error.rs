//! Error types for collaborator failures.

use thiserror::Error;

/// Errors produced by a chat channel (consent prompts and conversation output).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The platform API rejected the call.
    #[error("channel API error: {0}")]
    Api(String),

    /// Transport-level failure talking to the platform.
    #[error("channel transport error: {0}")]
    Transport(String),

    /// The platform answered with something we could not interpret.
    #[error("invalid channel response: {0}")]
    InvalidResponse(String),
}

/// Convenience alias for channel results.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors produced by the agent engine while streaming an execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("failed to start agent engine: {0}")]
    Spawn(String),

    /// I/O failure while reading engine output.
    #[error("agent engine I/O error: {0}")]
    Io(String),

    /// The engine emitted output that does not follow its protocol.
    #[error("agent engine protocol error: {0}")]
    Protocol(String),

    /// The engine exited unsuccessfully.
    #[error("agent engine exited with status {code:?}")]
    Exited {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_display() {
        let err = ChannelError::Api("channel_not_found".to_string());
        assert_eq!(err.to_string(), "channel API error: channel_not_found");
    }

    #[test]
    fn engine_error_display_exited() {
        let err = EngineError::Exited { code: Some(2) };
        assert_eq!(err.to_string(), "agent engine exited with status Some(2)");
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChannelError>();
        assert_send_sync::<EngineError>();
    }
}
