//! HTTP client for the approval bridge.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use warden_core::{ApprovalRoute, Behavior, PermissionRequest, PermissionResponse};

use crate::error::{PermissionError, PermissionResult};

/// Posts consent requests for one conversation to the bridge.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    route: ApprovalRoute,
}

impl BridgeClient {
    /// Client for an explicit route.
    #[must_use]
    pub fn new(route: ApprovalRoute) -> Self {
        Self {
            http: reqwest::Client::new(),
            route,
        }
    }

    /// Client for the route the daemon exported to this process.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::MissingEnv`] when the bridge URL or the
    /// conversation channel is absent.
    pub fn from_env() -> PermissionResult<Self> {
        ApprovalRoute::from_lookup(|name| std::env::var(name).ok())
            .map(Self::new)
            .map_err(PermissionError::MissingEnv)
    }

    /// The route requests are tagged with.
    #[must_use]
    pub fn route(&self) -> &ApprovalRoute {
        &self.route
    }

    /// Ask the bridge whether `tool_name` may run with `input`.
    ///
    /// Never fails: an unreachable bridge or an unreadable answer is a denial.
    pub async fn decide(&self, tool_name: &str, input: Map<String, Value>) -> PermissionResponse {
        match self.post(tool_name, input).await {
            Ok(response) => {
                debug!(tool = tool_name, behavior = ?response.behavior, "bridge answered");
                response
            },
            Err(e) => {
                warn!(tool = tool_name, error = %e, "approval bridge unavailable, denying");
                PermissionResponse {
                    behavior: Behavior::Deny,
                    message: format!("Approval service unavailable: {e}"),
                }
            },
        }
    }

    async fn post(
        &self,
        tool_name: &str,
        input: Map<String, Value>,
    ) -> PermissionResult<PermissionResponse> {
        let request = PermissionRequest {
            tool_name: tool_name.to_owned(),
            input,
            channel: self.route.channel.clone(),
            thread_ts: self.route.thread_ts.clone(),
            user: Some(self.route.user.clone()).filter(|u| !u.is_empty()),
            working_directory: Some(self.route.working_directory.clone())
                .filter(|d| !d.as_os_str().is_empty()),
        };
        // The bridge answers malformed requests with a deny body as well, so
        // the status code is not inspected.
        let response = self
            .http
            .post(&self.route.url)
            .json(&request)
            .send()
            .await?
            .json::<PermissionResponse>()
            .await?;
        Ok(response)
    }
}
