//! Block Kit messages for consent prompts.
//!
//! Reference: <https://api.slack.com/reference/block-kit/blocks>

use serde::Serialize;

use warden_core::{ConsentPrompt, PromptOutcome};

/// `action_id` of the approve button.
pub const APPROVE_ACTION: &str = "approve_tool";
/// `action_id` of the deny button.
pub const DENY_ACTION: &str = "deny_tool";

/// A Block Kit text object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextObject {
    /// `plain_text` or `mrkdwn`.
    #[serde(rename = "type")]
    pub text_type: &'static str,
    /// The text content.
    pub text: String,
}

impl TextObject {
    /// Plain text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text",
            text: text.into(),
        }
    }

    /// Markdown text.
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn",
            text: text.into(),
        }
    }
}

/// A button inside an actions block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    element_type: &'static str,
    /// Button label.
    pub text: TextObject,
    /// Identifies the action in the interaction callback.
    pub action_id: String,
    /// Sent back verbatim in the interaction callback.
    pub value: String,
    /// `primary` or `danger`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<&'static str>,
}

impl Button {
    /// A plain button.
    pub fn new(
        text: impl Into<String>,
        action_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            element_type: "button",
            text: TextObject::plain(text),
            action_id: action_id.into(),
            value: value.into(),
            style: None,
        }
    }

    /// Green button.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.style = Some("primary");
        self
    }

    /// Red button.
    #[must_use]
    pub fn danger(mut self) -> Self {
        self.style = Some("danger");
        self
    }
}

/// A top-level layout block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Large bold heading.
    Header {
        /// Heading text (plain only).
        text: TextObject,
    },
    /// Text section.
    Section {
        /// Section body.
        text: TextObject,
    },
    /// Small, muted text.
    Context {
        /// Context elements.
        elements: Vec<TextObject>,
    },
    /// Interactive elements.
    Actions {
        /// Lets callbacks identify the block.
        block_id: String,
        /// Buttons.
        elements: Vec<Button>,
    },
}

/// Escape the three characters Slack treats as control sequences.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Notification fallback text for a consent prompt.
#[must_use]
pub fn prompt_text(prompt: &ConsentPrompt) -> String {
    format!("Permission requested: {}", prompt.tool_name)
}

/// Notification fallback text for a settled prompt.
#[must_use]
pub fn outcome_text(prompt: &ConsentPrompt, outcome: &PromptOutcome) -> String {
    format!("{}: {outcome}", prompt.tool_name)
}

fn detail_blocks(prompt: &ConsentPrompt) -> Vec<Block> {
    let mut blocks = vec![
        Block::Header {
            text: TextObject::plain("Permission requested"),
        },
        Block::Section {
            text: TextObject::mrkdwn(format!("*Tool:* `{}`", escape(&prompt.tool_name))),
        },
        Block::Section {
            text: TextObject::mrkdwn(format!("```{}```", escape(&prompt.input_preview()))),
        },
    ];
    if let Some(dir) = &prompt.directory {
        blocks.push(Block::Context {
            elements: vec![TextObject::mrkdwn(format!(
                "Directory: `{}`",
                escape(&dir.display().to_string())
            ))],
        });
    }
    blocks
}

/// Blocks for a pending consent prompt: details plus approve/deny buttons
/// carrying the approval id.
#[must_use]
pub fn consent_prompt(prompt: &ConsentPrompt) -> Vec<Block> {
    let id = prompt.approval_id.to_string();
    let mut blocks = detail_blocks(prompt);
    blocks.push(Block::Actions {
        block_id: format!("approval:{id}"),
        elements: vec![
            Button::new("Approve", APPROVE_ACTION, id.clone()).primary(),
            Button::new("Deny", DENY_ACTION, id).danger(),
        ],
    });
    blocks
}

/// Blocks for a settled prompt: the same details, with the buttons replaced
/// by the outcome.
#[must_use]
pub fn settled_prompt(prompt: &ConsentPrompt, outcome: &PromptOutcome) -> Vec<Block> {
    let marker = match outcome {
        PromptOutcome::Approved { .. } => ":white_check_mark:",
        PromptOutcome::Denied { .. } => ":no_entry:",
        PromptOutcome::TimedOut => ":hourglass:",
        PromptOutcome::Shutdown => ":octagonal_sign:",
    };
    let mut blocks = detail_blocks(prompt);
    blocks.push(Block::Section {
        text: TextObject::mrkdwn(format!("{marker} {outcome}")),
    });
    blocks
}
