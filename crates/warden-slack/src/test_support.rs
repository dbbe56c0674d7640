//! In-process stand-in for the Slack Web API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::api::SlackApi;

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub(crate) method: String,
    pub(crate) authorization: Option<String>,
    pub(crate) body: Value,
}

struct FakeState {
    calls: Mutex<Vec<Call>>,
    response: Mutex<Value>,
    changed: Notify,
}

/// Records every Web API call and answers with a canned response.
#[derive(Clone)]
pub(crate) struct FakeSlack {
    base_url: String,
    state: Arc<FakeState>,
}

impl FakeSlack {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(FakeState {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new(json!({"ok": true, "ts": "1700000000.100000"})),
            changed: Notify::new(),
        });
        let app = Router::new()
            .route("/{method}", post(record))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub(crate) fn api(&self) -> SlackApi {
        SlackApi::with_base_url("xoxb-test", &self.base_url)
    }

    pub(crate) fn respond_with(&self, response: Value) {
        *self.state.response.lock().unwrap() = response;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub(crate) async fn wait_for_calls(&self, n: usize) -> Vec<Call> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let changed = self.state.changed.notified();
                let calls = self.calls();
                if calls.len() >= n {
                    return calls;
                }
                changed.await;
            }
        })
        .await
        .unwrap()
    }
}

async fn record(
    State(state): State<Arc<FakeState>>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.calls.lock().unwrap().push(Call {
        method,
        authorization,
        body,
    });
    state.changed.notify_waiters();
    let response = state.response.lock().unwrap().clone();
    Json(response)
}
