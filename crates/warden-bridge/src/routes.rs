//! HTTP routes of the approval bridge.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;

use warden_approval::ApprovalGate;
use warden_core::{DenyReason, PermissionDecision, PermissionRequest, PermissionResponse};

/// Path sandboxed tools post consent requests to.
pub const PERMISSION_PATH: &str = "/permission-request";

/// Build the bridge router. Anything but `POST /permission-request` is 404.
pub fn router(gate: ApprovalGate) -> Router {
    Router::new()
        .route(
            PERMISSION_PATH,
            post(permission_request).fallback(not_found),
        )
        .fallback(not_found)
        .with_state(gate)
}

/// The body is taken raw so that a malformed request still gets the deny
/// wire shape instead of the extractor's rejection.
async fn permission_request(
    State(gate): State<ApprovalGate>,
    body: Bytes,
) -> (StatusCode, Json<PermissionResponse>) {
    let request: PermissionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed permission request");
            let response = PermissionDecision::deny(DenyReason::InvalidRequest).to_response();
            return (StatusCode::BAD_REQUEST, Json(response));
        },
    };

    tracing::debug!(
        tool = %request.tool_name,
        channel = %request.channel,
        "permission request received"
    );
    let decision = gate.request(request).await;
    (StatusCode::OK, Json(decision.to_response()))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
