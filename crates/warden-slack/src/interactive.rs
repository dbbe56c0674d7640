//! Interactive callbacks (button clicks on consent prompts).

use serde::Deserialize;

use warden_core::HumanAction;

use crate::blocks::{APPROVE_ACTION, DENY_ACTION};
use crate::error::{SlackError, SlackResult};

/// A button click, reduced to what the approval gate needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAction {
    /// `action_id` of the clicked element.
    pub action_id: String,
    /// `value` of the clicked element.
    pub value: String,
    /// Slack user who clicked.
    pub user_id: Option<String>,
}

impl BlockAction {
    /// The consent decision this click stands for, if it is one of ours.
    #[must_use]
    pub fn human_action(&self) -> Option<HumanAction> {
        match self.action_id.as_str() {
            APPROVE_ACTION => Some(HumanAction::Approve),
            DENY_ACTION => Some(HumanAction::Deny),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(rename = "type")]
    kind: String,
    user: Option<User>,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Action {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

/// Extract the first block action from a form-encoded callback body
/// (`payload=<json>`).
///
/// # Errors
///
/// Returns [`SlackError::InvalidPayload`] if the body has no `payload`
/// field, the JSON does not parse, it is not a `block_actions` callback, or
/// it carries no action.
pub fn parse_form(body: &[u8]) -> SlackResult<BlockAction> {
    let payload = url::form_urlencoded::parse(body)
        .find(|(name, _)| name == "payload")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| SlackError::InvalidPayload("missing payload field".into()))?;
    parse_payload(&payload)
}

/// Extract the first block action from a callback's JSON payload.
///
/// # Errors
///
/// See [`parse_form`].
pub fn parse_payload(json: &str) -> SlackResult<BlockAction> {
    let payload: Payload =
        serde_json::from_str(json).map_err(|e| SlackError::InvalidPayload(e.to_string()))?;
    if payload.kind != "block_actions" {
        return Err(SlackError::InvalidPayload(format!(
            "unsupported interaction type: {}",
            payload.kind
        )));
    }
    let action = payload
        .actions
        .into_iter()
        .next()
        .ok_or_else(|| SlackError::InvalidPayload("empty actions array".into()))?;
    Ok(BlockAction {
        action_id: action.action_id,
        value: action.value.unwrap_or_default(),
        user_id: payload.user.map(|u| u.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn click(action_id: &str, value: &str) -> String {
        json!({
            "type": "block_actions",
            "user": {"id": "U7", "username": "ana"},
            "container": {"type": "message", "message_ts": "1.2", "channel_id": "C1"},
            "actions": [{
                "type": "button",
                "action_id": action_id,
                "block_id": "approval:x",
                "value": value,
                "action_ts": "1.3"
            }]
        })
        .to_string()
    }

    fn form(payload: &str) -> Vec<u8> {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("payload", payload)
            .finish()
            .into_bytes()
    }

    #[test]
    fn parses_approve_click() {
        let action = parse_form(&form(&click(APPROVE_ACTION, "abc"))).unwrap();
        assert_eq!(
            action,
            BlockAction {
                action_id: APPROVE_ACTION.to_string(),
                value: "abc".to_string(),
                user_id: Some("U7".to_string()),
            }
        );
        assert_eq!(action.human_action(), Some(HumanAction::Approve));
    }

    #[test]
    fn maps_deny_and_unknown_actions() {
        let deny = parse_payload(&click(DENY_ACTION, "abc")).unwrap();
        assert_eq!(deny.human_action(), Some(HumanAction::Deny));

        let other = parse_payload(&click("open_link", "abc")).unwrap();
        assert_eq!(other.human_action(), None);
    }

    #[test]
    fn missing_payload_field() {
        let err = parse_form(b"token=abc").unwrap_err();
        assert!(matches!(err, SlackError::InvalidPayload(ref m) if m.contains("payload")));
    }

    #[test]
    fn rejects_other_interaction_types() {
        let payload = json!({"type": "view_submission", "user": {"id": "U1"}}).to_string();
        assert!(parse_payload(&payload).is_err());
    }

    #[test]
    fn rejects_empty_actions_and_bad_json() {
        let payload = json!({"type": "block_actions", "actions": []}).to_string();
        assert!(parse_payload(&payload).is_err());
        assert!(parse_payload("{").is_err());
    }
}
