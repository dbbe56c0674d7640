use super::*;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use warden_admission::{AdmissionLimits, ExecutionOutcome, Executor};
use warden_approval::DEFAULT_TIMEOUT;
use warden_core::ConversationKey;
use warden_test::{MockPromptChannel, RecordingSink, test_permission_request};

use crate::blocks::{APPROVE_ACTION, DENY_ACTION};
use crate::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER, unix_now};

const SECRET: &str = "test-signing-secret";

/// Records what it was asked to run and holds it until cancelled.
#[derive(Default)]
struct HoldingExecutor {
    seen: Mutex<Vec<(ConversationKey, String)>>,
    started: Notify,
}

impl HoldingExecutor {
    fn seen(&self) -> Vec<(ConversationKey, String)> {
        self.seen.lock().unwrap().clone()
    }

    async fn wait_for(&self, n: usize) -> Vec<(ConversationKey, String)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let started = self.started.notified();
                let seen = self.seen();
                if seen.len() >= n {
                    return seen;
                }
                started.await;
            }
        })
        .await
        .unwrap()
    }
}

#[async_trait]
impl Executor<String> for HoldingExecutor {
    async fn execute(
        &self,
        key: ConversationKey,
        payload: String,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        self.seen.lock().unwrap().push((key, payload));
        self.started.notify_waiters();
        cancel.cancelled().await;
        ExecutionOutcome::Cancelled
    }
}

struct Harness {
    app: Router,
    gate: ApprovalGate,
    channel: MockPromptChannel,
    admission: AdmissionController<String>,
    executor: Arc<HoldingExecutor>,
    sink: RecordingSink,
}

fn harness() -> Harness {
    let channel = MockPromptChannel::new();
    let gate = ApprovalGate::new(Arc::new(channel.clone()), DEFAULT_TIMEOUT);
    let executor = Arc::new(HoldingExecutor::default());
    let admission = AdmissionController::new(
        Arc::clone(&executor) as Arc<dyn Executor<String>>,
        AdmissionLimits::default(),
    );
    let sink = RecordingSink::new();
    let app = router(SlackState {
        gate: gate.clone(),
        admission: admission.clone(),
        sink: Arc::new(sink.clone()),
        verifier: SignatureVerifier::new(SECRET),
    });
    Harness {
        app,
        gate,
        channel,
        admission,
        executor,
        sink,
    }
}

fn signed(path: &str, content_type: &str, body: String) -> Request<Body> {
    let ts = unix_now().to_string();
    let signature = SignatureVerifier::new(SECRET).sign(&ts, body.as_bytes());
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", content_type)
        .header(TIMESTAMP_HEADER, ts)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

fn click(action_id: &str, value: &str) -> Request<Body> {
    let payload = json!({
        "type": "block_actions",
        "user": {"id": "U2"},
        "actions": [{"type": "button", "action_id": action_id, "value": value}]
    })
    .to_string();
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", &payload)
        .finish();
    signed(ACTIONS_PATH, "application/x-www-form-urlencoded", body)
}

fn event(event: Value) -> Request<Body> {
    let body = json!({"type": "event_callback", "event": event}).to_string();
    signed(EVENTS_PATH, "application/json", body)
}

fn mention(text: &str) -> Value {
    json!({
        "type": "app_mention",
        "user": "U1",
        "channel": "C1",
        "text": text,
        "ts": "1700000000.000001"
    })
}

#[tokio::test]
async fn unsigned_action_is_rejected() {
    let h = harness();
    let request = Request::builder()
        .method(Method::POST)
        .uri(ACTIONS_PATH)
        .body(Body::from("payload=%7B%7D"))
        .unwrap();

    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn badly_signed_action_is_rejected() {
    let h = harness();
    let mut request = click(APPROVE_ACTION, "x");
    request.headers_mut().insert(
        SIGNATURE_HEADER,
        "v0=0000000000000000000000000000000000000000000000000000000000000000"
            .parse()
            .unwrap(),
    );

    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn approve_click_resolves_pending_request() {
    let h = harness();
    let gate = h.gate.clone();
    let pending = tokio::spawn(async move {
        gate.request(test_permission_request("Bash", json!({"command": "ls"})))
            .await
    });
    h.channel.wait_for_posts(1).await;
    let id = h.channel.posted()[0].approval_id.to_string();

    let response = h.app.oneshot(click(APPROVE_ACTION, &id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let decision = pending.await.unwrap();
    assert!(decision.is_allowed());
    h.channel.wait_for_updates(1).await;
    assert_eq!(
        h.channel.updates()[0].1,
        warden_core::PromptOutcome::Approved {
            actor: Some("U2".to_string())
        }
    );
}

#[tokio::test]
async fn deny_click_resolves_pending_request() {
    let h = harness();
    let gate = h.gate.clone();
    let pending = tokio::spawn(async move {
        gate.request(test_permission_request("Bash", json!({"command": "rm -rf /"})))
            .await
    });
    h.channel.wait_for_posts(1).await;
    let id = h.channel.posted()[0].approval_id.to_string();

    h.app.oneshot(click(DENY_ACTION, &id)).await.unwrap();

    assert!(!pending.await.unwrap().is_allowed());
}

#[tokio::test]
async fn clicks_with_bad_or_unknown_ids_are_acknowledged() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(click(APPROVE_ACTION, "not-an-id"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let unknown = warden_core::ApprovalId::new().to_string();
    let response = h.app.oneshot(click(DENY_ACTION, &unknown)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.gate.pending_count(), 0);
}

#[tokio::test]
async fn malformed_action_body_is_400() {
    let h = harness();
    let request = signed(
        ACTIONS_PATH,
        "application/x-www-form-urlencoded",
        "token=abc".to_string(),
    );

    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let h = harness();
    let body = json!({"type": "url_verification", "token": "t", "challenge": "c-42"}).to_string();

    let response = h
        .app
        .oneshot(signed(EVENTS_PATH, "application/json", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json, json!({"challenge": "c-42"}));
}

#[tokio::test]
async fn unsigned_event_is_rejected() {
    let h = harness();
    let request = Request::builder()
        .method(Method::POST)
        .uri(EVENTS_PATH)
        .body(Body::from(
            json!({"type": "url_verification", "challenge": "c"}).to_string(),
        ))
        .unwrap();

    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mention_is_admitted() {
    let h = harness();

    let response = h
        .app
        .oneshot(event(mention("<@UBOT> fix the build")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = h.executor.wait_for(1).await;
    assert_eq!(
        seen[0],
        (
            ConversationKey::new("U1", "C1", Some("1700000000.000001")),
            "fix the build".to_string()
        )
    );
    assert!(h.sink.deliveries().is_empty());
    h.admission.shutdown();
}

#[tokio::test]
async fn busy_conversation_gets_queue_notice() {
    let h = harness();
    h.app
        .clone()
        .oneshot(event(mention("<@UBOT> first")))
        .await
        .unwrap();
    h.executor.wait_for(1).await;

    h.app
        .oneshot(event(mention("<@UBOT> second")))
        .await
        .unwrap();

    let key = ConversationKey::new("U1", "C1", Some("1700000000.000001"));
    assert_eq!(h.sink.notices_for(&key), vec![Notice::Queued { position: 1 }]);
    assert_eq!(h.admission.stats().queued, 1);
    h.admission.shutdown();
}

#[tokio::test]
async fn retries_are_ignored() {
    let h = harness();
    let mut request = event(mention("<@UBOT> again"));
    request
        .headers_mut()
        .insert(RETRY_HEADER, "1".parse().unwrap());

    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.admission.stats().active, 0);
    assert!(h.executor.seen().is_empty());
}

#[tokio::test]
async fn bot_messages_are_ignored() {
    let h = harness();
    let response = h
        .app
        .oneshot(event(json!({
            "type": "message",
            "channel_type": "im",
            "bot_id": "B1",
            "channel": "D1",
            "text": "Your request is queued (position 1).",
            "ts": "1.1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.admission.stats().active, 0);
}

#[tokio::test]
async fn intake_after_shutdown_is_dropped() {
    let h = harness();
    h.admission.shutdown();

    let response = h
        .app
        .oneshot(event(mention("<@UBOT> late")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.sink.deliveries().is_empty());
    assert!(h.executor.seen().is_empty());
}

#[tokio::test]
async fn malformed_event_is_400() {
    let h = harness();
    let response = h
        .app
        .oneshot(signed(EVENTS_PATH, "application/json", "{".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
