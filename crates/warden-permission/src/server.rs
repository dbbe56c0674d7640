//! The MCP tool the agent calls before running a sensitive tool.
//!
//! The agent CLI is started with `--permission-prompt-tool mcp__warden__approve`.
//! It calls `approve` with the pending tool call and expects a text result
//! holding either `{"behavior":"allow","updatedInput":{..}}` or
//! `{"behavior":"deny","message":".."}`.

use std::path::Path;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use warden_core::{ApprovalRoute, Behavior, PermissionResponse};

use crate::forward::BridgeClient;

/// Name the agent knows this server by.
pub const SERVER_NAME: &str = "warden";

/// Fully qualified tool name for `--permission-prompt-tool`.
pub const PROMPT_TOOL: &str = "mcp__warden__approve";

/// Arguments the agent passes for each pending tool call.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConsentArgs {
    /// Tool the agent wants to run.
    pub tool_name: String,
    /// Input the tool would run with.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Agent-side id of the tool call.
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

/// Translate a bridge decision into the agent's permission-prompt answer.
#[must_use]
pub fn decision_payload(response: &PermissionResponse, input: &Map<String, Value>) -> Value {
    match response.behavior {
        Behavior::Allow => json!({"behavior": "allow", "updatedInput": input}),
        Behavior::Deny => json!({"behavior": "deny", "message": response.message}),
    }
}

/// MCP config handing the agent a consent server for one execution.
///
/// The route is passed in the server's own environment, so the agent does
/// not need to forward anything.
#[must_use]
pub fn mcp_config(command: &Path, route: &ApprovalRoute) -> Value {
    let env: Map<String, Value> = route
        .to_env()
        .into_iter()
        .map(|(name, value)| (name.to_owned(), Value::String(value)))
        .collect();
    json!({
        "mcpServers": {
            SERVER_NAME: {
                "type": "stdio",
                "command": command.display().to_string(),
                "args": [],
                "env": env,
            }
        }
    })
}

/// Consent server for one agent process.
#[derive(Clone)]
pub struct ConsentServer {
    bridge: Arc<BridgeClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ConsentServer {
    /// Serve consent decisions from `bridge`.
    #[must_use]
    pub fn new(bridge: BridgeClient) -> Self {
        Self {
            bridge: Arc::new(bridge),
            tool_router: Self::tool_router(),
        }
    }

    /// Ask a human in the conversation whether a tool call may run.
    #[tool(description = "Ask the conversation owner whether a tool call may run")]
    pub async fn approve(
        &self,
        Parameters(args): Parameters<ConsentArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.bridge.decide(&args.tool_name, args.input.clone()).await;
        info!(
            tool = %args.tool_name,
            tool_use_id = args.tool_use_id.as_deref().unwrap_or(""),
            behavior = ?response.behavior,
            "consent decided"
        );
        let payload = decision_payload(&response, &args.input);
        Ok(CallToolResult::success(vec![Content::text(
            payload.to_string(),
        )]))
    }
}

#[tool_handler]
impl ServerHandler for ConsentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Routes the agent's tool permission prompts to a human in chat.".to_owned(),
            ),
            ..ServerInfo::default()
        }
    }
}
