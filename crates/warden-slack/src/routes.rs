//! Slack callback endpoints.
//!
//! - `POST /slack/actions`: button clicks on consent prompts
//! - `POST /slack/events`: Events API (URL verification, inbound prompts)
//!
//! Both verify the request signature before looking at the body and always
//! answer quickly; Slack retries anything that is not a timely 2xx.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::json;
use tracing::{debug, info, warn};

use warden_admission::{Admission, AdmissionController};
use warden_approval::{ApprovalGate, Resolution};
use warden_core::{EventSink, Notice};

use crate::events::{Envelope, Intake, RETRY_HEADER};
use crate::interactive;
use crate::verify::SignatureVerifier;

/// Interactive callback path.
pub const ACTIONS_PATH: &str = "/slack/actions";
/// Events API path.
pub const EVENTS_PATH: &str = "/slack/events";

/// Everything the Slack endpoints act on.
#[derive(Clone)]
pub struct SlackState {
    /// Receives consent decisions.
    pub gate: ApprovalGate,
    /// Receives inbound prompts.
    pub admission: AdmissionController<String>,
    /// Where queue notices are posted.
    pub sink: Arc<dyn EventSink>,
    /// Checks request signatures.
    pub verifier: SignatureVerifier,
}

/// Build the Slack router.
pub fn router(state: SlackState) -> Router {
    Router::new()
        .route(ACTIONS_PATH, post(actions))
        .route(EVENTS_PATH, post(events))
        .with_state(state)
}

fn verified(state: &SlackState, headers: &HeaderMap, body: &[u8]) -> bool {
    match state.verifier.verify_headers(headers, body) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "rejecting unverified Slack request");
            false
        },
    }
}

async fn actions(State(state): State<SlackState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if !verified(&state, &headers, &body) {
        return StatusCode::UNAUTHORIZED;
    }
    let action = match interactive::parse_form(&body) {
        Ok(action) => action,
        Err(e) => {
            warn!(error = %e, "malformed interaction payload");
            return StatusCode::BAD_REQUEST;
        },
    };
    let Some(human) = action.human_action() else {
        debug!(action_id = %action.action_id, "ignoring unrelated action");
        return StatusCode::OK;
    };

    match state
        .gate
        .resolve_str(&action.value, human, action.user_id.clone())
        .await
    {
        Ok(Resolution::Resolved) => {
            info!(approval_id = %action.value, user = ?action.user_id, "consent recorded");
        },
        Ok(Resolution::AlreadySettled) => {
            debug!(approval_id = %action.value, "click on a settled prompt");
        },
        Err(e) => warn!(error = %e, "interaction carried a bad approval id"),
    }
    StatusCode::OK
}

async fn events(State(state): State<SlackState>, headers: HeaderMap, body: Bytes) -> Response {
    if !verified(&state, &headers, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(retry) = headers.get(RETRY_HEADER) {
        debug!(retry = ?retry, "ignoring redelivered event");
        return StatusCode::OK.into_response();
    }
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed event callback");
            return StatusCode::BAD_REQUEST.into_response();
        },
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            Json(json!({ "challenge": challenge })).into_response()
        },
        Envelope::EventCallback { event } => {
            if let Some(intake) = event.intake() {
                admit(&state, intake).await;
            }
            StatusCode::OK.into_response()
        },
        Envelope::Other => StatusCode::OK.into_response(),
    }
}

async fn admit(state: &SlackState, intake: Intake) {
    let Intake { key, prompt } = intake;
    let notice = match state.admission.submit(key.clone(), prompt) {
        Ok(Admission::Started) => None,
        Ok(Admission::Queued { position }) => Some(Notice::Queued { position }),
        Ok(Admission::Rejected { depth }) => Some(Notice::Rejected { depth }),
        Err(e) => {
            warn!(conversation = %key, error = %e, "prompt not admitted");
            None
        },
    };
    if let Some(notice) = notice
        && let Err(e) = state.sink.notify(&key, notice).await
    {
        warn!(conversation = %key, error = %e, "failed to post queue notice");
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
