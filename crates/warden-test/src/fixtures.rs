//! Test fixtures for common types.

use std::path::PathBuf;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use warden_core::{
    AgentEvent, ApprovalId, ApprovalRoute, ConsentPrompt, ConversationKey, EngineRequest,
    PermissionRequest,
};

/// Create a threaded conversation key for `user` in channel `C1`.
#[must_use]
pub fn test_key(user: &str) -> ConversationKey {
    ConversationKey::new(user, "C1", Some("1700000000.000001"))
}

/// Create a permission request for `tool` with the given JSON input object.
///
/// Non-object inputs produce an empty input map.
#[must_use]
pub fn test_permission_request(tool: &str, input: serde_json::Value) -> PermissionRequest {
    PermissionRequest {
        tool_name: tool.to_string(),
        input: input.as_object().cloned().unwrap_or_default(),
        channel: "C1".to_string(),
        thread_ts: Some("1700000000.000001".to_string()),
        user: Some("U1".to_string()),
        working_directory: None,
    }
}

/// Create a permission request scoped to `directory`.
#[must_use]
pub fn test_scoped_request(
    tool: &str,
    input: serde_json::Value,
    directory: impl Into<PathBuf>,
) -> PermissionRequest {
    PermissionRequest {
        working_directory: Some(directory.into()),
        ..test_permission_request(tool, input)
    }
}

/// Create a consent prompt for `tool` with a small command input.
#[must_use]
pub fn test_consent_prompt(tool: &str) -> ConsentPrompt {
    ConsentPrompt {
        approval_id: ApprovalId::new(),
        tool_name: tool.to_string(),
        input: json!({"command": "ls -la"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
        directory: Some(PathBuf::from("/repo")),
        channel: "C1".to_string(),
        thread_ts: None,
        user: Some("U1".to_string()),
    }
}

/// Create an approval route pointing at a dummy bridge URL.
#[must_use]
pub fn test_approval_route(key: &ConversationKey) -> ApprovalRoute {
    ApprovalRoute {
        url: "http://127.0.0.1:9/permission-request".to_string(),
        channel: key.channel().to_string(),
        thread_ts: key.thread().map(str::to_string),
        user: key.user().to_string(),
        working_directory: PathBuf::from("/repo"),
    }
}

/// Create an engine request for `prompt` with a fresh cancellation token.
#[must_use]
pub fn test_engine_request(key: &ConversationKey, prompt: &str) -> EngineRequest {
    EngineRequest {
        prompt: prompt.to_string(),
        resume_session: None,
        working_directory: PathBuf::from("/repo"),
        cancel: CancellationToken::new(),
        approval: test_approval_route(key),
    }
}

/// A typical successful event sequence: init, one text chunk, completion.
#[must_use]
pub fn test_success_events(session_id: &str, text: &str) -> Vec<AgentEvent> {
    vec![
        AgentEvent::Init {
            session_id: session_id.to_string(),
        },
        AgentEvent::Text {
            text: text.to_string(),
        },
        AgentEvent::Completed {
            result: Some(text.to_string()),
            is_error: false,
        },
    ]
}
