//! Permission request/response types.
//!
//! [`PermissionRequest`] and [`PermissionResponse`] are the wire format of the
//! loopback approval bridge. Internally decisions are carried as the tagged
//! [`PermissionDecision`] variant and only converted to the wire shape at the
//! boundary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a pending approval.
///
/// Travels through the consent prompt as the correlation token carried by
/// the approve/deny actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(Uuid);

impl ApprovalId {
    /// Create a new random approval ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApprovalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A sandboxed tool's request for consent, as received by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Name of the tool the agent wants to run (e.g. `Bash`, `Write`).
    pub tool_name: String,
    /// The tool's input arguments.
    pub input: serde_json::Map<String, serde_json::Value>,
    /// Chat channel the requesting conversation lives in.
    pub channel: String,
    /// Thread of the requesting conversation, if any.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// User who owns the requesting conversation.
    #[serde(default)]
    pub user: Option<String>,
    /// Working directory of the execution, used to scope remembered approvals.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

impl PermissionRequest {
    /// The working directory, ignoring an empty path.
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.working_directory
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// Wire-level behavior of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// The tool may run.
    Allow,
    /// The tool must not run.
    Deny,
}

/// Wire-level response returned to the requesting tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResponse {
    /// Whether the tool may run.
    pub behavior: Behavior,
    /// Human-readable explanation.
    pub message: String,
}

/// How an allow decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowSource {
    /// A human approved this specific request.
    User,
    /// A prior human approval for the same tool and directory covered it.
    Remembered,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A human denied the request.
    User,
    /// Nobody answered before the deadline.
    Timeout,
    /// The approval service shut down while the request was pending.
    Shutdown,
    /// The request body could not be parsed.
    InvalidRequest,
    /// The consent prompt could not be delivered.
    DeliveryFailed,
}

impl DenyReason {
    /// The message sent back to the requester.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::User => "Denied by user",
            Self::Timeout => "Permission request timed out",
            Self::Shutdown => "Approval service shutting down",
            Self::InvalidRequest => "Invalid request",
            Self::DeliveryFailed => "Failed to deliver approval request",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The outcome of a consent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    /// The tool may run.
    Allow {
        /// How the approval was obtained.
        source: AllowSource,
    },
    /// The tool must not run.
    Deny {
        /// Why it was denied.
        reason: DenyReason,
    },
}

impl PermissionDecision {
    /// Shorthand for a denial.
    #[must_use]
    pub fn deny(reason: DenyReason) -> Self {
        Self::Deny { reason }
    }

    /// Check whether this decision allows the tool to run.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Convert to the wire response.
    #[must_use]
    pub fn to_response(&self) -> PermissionResponse {
        match self {
            Self::Allow {
                source: AllowSource::User,
            } => PermissionResponse {
                behavior: Behavior::Allow,
                message: "Approved by user".to_owned(),
            },
            Self::Allow {
                source: AllowSource::Remembered,
            } => PermissionResponse {
                behavior: Behavior::Allow,
                message: "Auto-approved for this directory".to_owned(),
            },
            Self::Deny { reason } => PermissionResponse {
                behavior: Behavior::Deny,
                message: reason.message().to_owned(),
            },
        }
    }
}

impl From<PermissionDecision> for PermissionResponse {
    fn from(decision: PermissionDecision) -> Self {
        decision.to_response()
    }
}

/// A human's answer to a consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanAction {
    /// Approve the request.
    Approve,
    /// Deny the request.
    Deny,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_minimal_body() {
        let req: PermissionRequest = serde_json::from_value(json!({
            "tool_name": "Bash",
            "input": {"command": "ls"},
            "channel": "C1"
        }))
        .unwrap();
        assert_eq!(req.tool_name, "Bash");
        assert!(req.thread_ts.is_none());
        assert!(req.directory().is_none());
    }

    #[test]
    fn request_rejects_non_object_input() {
        let result: Result<PermissionRequest, _> = serde_json::from_value(json!({
            "tool_name": "Bash",
            "input": "ls",
            "channel": "C1"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn request_requires_tool_name() {
        let result: Result<PermissionRequest, _> = serde_json::from_value(json!({
            "input": {},
            "channel": "C1"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn empty_working_directory_is_ignored() {
        let req: PermissionRequest = serde_json::from_value(json!({
            "tool_name": "Write",
            "input": {},
            "channel": "C1",
            "working_directory": ""
        }))
        .unwrap();
        assert!(req.directory().is_none());
    }

    #[test]
    fn deny_by_user_wire_shape() {
        let response = PermissionDecision::deny(DenyReason::User).to_response();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"behavior": "deny", "message": "Denied by user"})
        );
    }

    #[test]
    fn timeout_message() {
        let response: PermissionResponse = PermissionDecision::deny(DenyReason::Timeout).into();
        assert_eq!(response.message, "Permission request timed out");
        assert_eq!(response.behavior, Behavior::Deny);
    }

    #[test]
    fn allow_wire_shape() {
        let response = PermissionDecision::Allow {
            source: AllowSource::User,
        }
        .to_response();
        assert_eq!(response.behavior, Behavior::Allow);
        assert_eq!(
            serde_json::to_value(Behavior::Allow).unwrap(),
            json!("allow")
        );
    }

    #[test]
    fn approval_id_round_trips_through_display() {
        let id = ApprovalId::new();
        let parsed: ApprovalId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ApprovalId>().is_err());
    }
}
