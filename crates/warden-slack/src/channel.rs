//! Slack implementations of the chat collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use warden_core::{
    AgentEvent, ChannelResult, ConsentPrompt, ConversationKey, EventSink, MessageHandle, Notice,
    PromptChannel, PromptOutcome,
};

use crate::api::SlackApi;
use crate::blocks;

/// Posts consent prompts as interactive messages and rewrites them once
/// they settle.
#[derive(Debug, Clone)]
pub struct SlackPromptChannel {
    api: Arc<SlackApi>,
}

impl SlackPromptChannel {
    /// Channel posting through `api`.
    #[must_use]
    pub fn new(api: Arc<SlackApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PromptChannel for SlackPromptChannel {
    async fn post_prompt(&self, prompt: &ConsentPrompt) -> ChannelResult<MessageHandle> {
        let ts = self
            .api
            .post_message(
                &prompt.channel,
                &blocks::prompt_text(prompt),
                prompt.thread_ts.as_deref(),
                &blocks::consent_prompt(prompt),
            )
            .await?;
        debug!(approval_id = %prompt.approval_id, %ts, "consent prompt posted");
        Ok(MessageHandle {
            channel: prompt.channel.clone(),
            ts,
        })
    }

    async fn update_prompt(
        &self,
        handle: &MessageHandle,
        prompt: &ConsentPrompt,
        outcome: &PromptOutcome,
    ) -> ChannelResult<()> {
        self.api
            .update_message(
                &handle.channel,
                &handle.ts,
                &blocks::outcome_text(prompt, outcome),
                &blocks::settled_prompt(prompt, outcome),
            )
            .await?;
        Ok(())
    }
}

/// Posts agent output and lifecycle notices into the conversation's
/// thread as plain text.
#[derive(Debug, Clone)]
pub struct SlackEventSink {
    api: Arc<SlackApi>,
}

impl SlackEventSink {
    /// Sink posting through `api`.
    #[must_use]
    pub fn new(api: Arc<SlackApi>) -> Self {
        Self { api }
    }

    async fn say(&self, key: &ConversationKey, text: &str) -> ChannelResult<()> {
        self.api
            .post_message(key.channel(), text, key.thread(), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for SlackEventSink {
    async fn deliver(&self, key: &ConversationKey, event: &AgentEvent) -> ChannelResult<()> {
        match event {
            AgentEvent::Text { text } if !text.trim().is_empty() => self.say(key, text).await,
            AgentEvent::Completed {
                result,
                is_error: true,
            } => {
                let detail = result.as_deref().unwrap_or("no details");
                self.say(key, &format!("The agent stopped with an error: {detail}"))
                    .await
            },
            // Tool calls and session bookkeeping stay out of the thread.
            _ => Ok(()),
        }
    }

    async fn notify(&self, key: &ConversationKey, notice: Notice) -> ChannelResult<()> {
        self.say(key, &notice.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use warden_core::ChannelError;
    use warden_test::{test_consent_prompt, test_key};

    use crate::blocks::{APPROVE_ACTION, DENY_ACTION};
    use crate::test_support::FakeSlack;

    async fn setup() -> (FakeSlack, Arc<SlackApi>) {
        let slack = FakeSlack::start().await;
        let api = Arc::new(slack.api());
        (slack, api)
    }

    #[tokio::test]
    async fn post_prompt_returns_handle_and_sends_buttons() {
        let (slack, api) = setup().await;
        let channel = SlackPromptChannel::new(api);
        let mut prompt = test_consent_prompt("Bash");
        prompt.thread_ts = Some("1700000000.000001".to_string());

        let handle = channel.post_prompt(&prompt).await.unwrap();

        assert_eq!(
            handle,
            MessageHandle {
                channel: "C1".to_string(),
                ts: "1700000000.100000".to_string(),
            }
        );
        let body = &slack.calls()[0].body;
        assert_eq!(body["thread_ts"], "1700000000.000001");
        assert_eq!(body["text"], "Permission requested: Bash");
        let actions = body["blocks"].as_array().unwrap().last().unwrap().clone();
        let id = prompt.approval_id.to_string();
        assert_eq!(actions["elements"][0]["action_id"], APPROVE_ACTION);
        assert_eq!(actions["elements"][1]["action_id"], DENY_ACTION);
        assert_eq!(actions["elements"][0]["value"], id.as_str());
    }

    #[tokio::test]
    async fn post_prompt_failure_is_channel_error() {
        let (slack, api) = setup().await;
        slack.respond_with(json!({"ok": false, "error": "not_in_channel"}));
        let channel = SlackPromptChannel::new(api);

        let err = channel
            .post_prompt(&test_consent_prompt("Bash"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Api(ref e) if e == "not_in_channel"));
    }

    #[tokio::test]
    async fn update_prompt_rewrites_message() {
        let (slack, api) = setup().await;
        let channel = SlackPromptChannel::new(api);
        let handle = MessageHandle {
            channel: "C1".to_string(),
            ts: "5.5".to_string(),
        };
        let outcome = PromptOutcome::Approved {
            actor: Some("U2".to_string()),
        };

        channel
            .update_prompt(&handle, &test_consent_prompt("Write"), &outcome)
            .await
            .unwrap();

        let call = &slack.calls()[0];
        assert_eq!(call.method, "chat.update");
        assert_eq!(call.body["ts"], "5.5");
        assert_eq!(call.body["text"], "Write: Approved by <@U2>");
        assert!(!call.body["blocks"].to_string().contains(APPROVE_ACTION));
    }

    #[tokio::test]
    async fn sink_posts_text_in_thread() {
        let (slack, api) = setup().await;
        let sink = SlackEventSink::new(api);
        let key = test_key("U1");

        sink.deliver(
            &key,
            &AgentEvent::Text {
                text: "Done.".to_string(),
            },
        )
        .await
        .unwrap();

        let body = &slack.calls()[0].body;
        assert_eq!(body["channel"], "C1");
        assert_eq!(body["thread_ts"], "1700000000.000001");
        assert_eq!(body["text"], "Done.");
        assert!(body.get("blocks").is_none());
    }

    #[tokio::test]
    async fn sink_skips_non_text_events() {
        let (slack, api) = setup().await;
        let sink = SlackEventSink::new(api);
        let key = test_key("U1");

        for event in [
            AgentEvent::Init {
                session_id: "s1".to_string(),
            },
            AgentEvent::ToolUse {
                name: "Bash".to_string(),
                input: json!({"command": "ls"}),
            },
            AgentEvent::Text {
                text: "   ".to_string(),
            },
            AgentEvent::Completed {
                result: Some("Done.".to_string()),
                is_error: false,
            },
        ] {
            sink.deliver(&key, &event).await.unwrap();
        }
        assert!(slack.calls().is_empty());
    }

    #[tokio::test]
    async fn sink_reports_error_results() {
        let (slack, api) = setup().await;
        let sink = SlackEventSink::new(api);

        sink.deliver(
            &test_key("U1"),
            &AgentEvent::Completed {
                result: Some("max turns reached".to_string()),
                is_error: true,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            slack.calls()[0].body["text"],
            "The agent stopped with an error: max turns reached"
        );
    }

    #[tokio::test]
    async fn sink_posts_notices() {
        let (slack, api) = setup().await;
        let sink = SlackEventSink::new(api);

        sink.notify(&test_key("U1"), Notice::Queued { position: 2 })
            .await
            .unwrap();

        assert_eq!(
            slack.calls()[0].body["text"],
            "Your request is queued (position 2)."
        );
    }
}
