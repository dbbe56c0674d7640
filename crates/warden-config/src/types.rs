//! Configuration types for the warden daemon.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::collections::HashMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the warden daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Concurrency cap and per-conversation queue bound.
    pub admission: AdmissionSection,
    /// Approval deadline and loopback bridge address.
    pub approval: ApprovalSection,
    /// Session idle window and sweep cadence.
    pub sessions: SessionsSection,
    /// Agent engine subprocess.
    pub agent: AgentSection,
    /// Slack credentials and intake listener.
    pub slack: SlackSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// AdmissionSection
// ---------------------------------------------------------------------------

/// Admission controller limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionSection {
    /// Maximum concurrently running executions across all conversations.
    pub max_concurrency: usize,
    /// Maximum queued requests per conversation. `0` means unbounded.
    pub max_queue_per_conversation: usize,
}

impl Default for AdmissionSection {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_queue_per_conversation: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ApprovalSection
// ---------------------------------------------------------------------------

/// Approval gate and bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Seconds to wait for a human decision before denying.
    pub timeout_secs: u64,
    /// Host the bridge binds. Must be a loopback address.
    pub bridge_host: String,
    /// Port the bridge binds. `0` picks an ephemeral port.
    pub bridge_port: u16,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            bridge_host: "127.0.0.1".to_owned(),
            bridge_port: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionsSection
// ---------------------------------------------------------------------------

/// Conversation session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Seconds of inactivity after which a session is garbage-collected.
    pub idle_timeout_secs: u64,
    /// Seconds between cleanup sweeps.
    pub sweep_interval_secs: u64,
    /// Working directory for new sessions. Empty means the daemon's cwd.
    pub default_working_directory: String,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
            sweep_interval_secs: 300,
            default_working_directory: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentSection
// ---------------------------------------------------------------------------

/// The agent engine subprocess.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Executable to run.
    pub command: String,
    /// Extra arguments placed before the generated ones.
    pub args: Vec<String>,
    /// Extra environment for the subprocess.
    pub extra_env: HashMap<String, String>,
    /// Path of the `warden-permission` consent server the agent launches.
    /// Empty means the binary installed next to `wardend`.
    pub permission_command: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: "claude".to_owned(),
            args: Vec::new(),
            extra_env: HashMap::new(),
            permission_command: String::new(),
        }
    }
}

impl std::fmt::Debug for AgentSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted_env: HashMap<&String, &str> =
            self.extra_env.keys().map(|k| (k, "***")).collect();
        f.debug_struct("AgentSection")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("extra_env", &redacted_env)
            .field("permission_command", &self.permission_command)
            .finish()
    }
}

impl Serialize for AgentSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys: Vec<&String> = self.extra_env.keys().collect();
        let mut state = serializer.serialize_struct("AgentSection", 4)?;
        state.serialize_field("command", &self.command)?;
        state.serialize_field("args", &self.args)?;
        // Values may hold credentials; only the names are emitted.
        state.serialize_field("extra_env_keys", &keys)?;
        state.serialize_field("permission_command", &self.permission_command)?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// SlackSection
// ---------------------------------------------------------------------------

/// Slack app credentials and the public intake listener.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SlackSection {
    /// Bot token (`xoxb-...`). Prefer `SLACK_BOT_TOKEN` over storing this in a file.
    pub bot_token: String,
    /// Signing secret used to verify inbound requests.
    pub signing_secret: String,
    /// Address the Slack intake listener binds.
    pub listen_addr: String,
}

impl SlackSection {
    /// Whether both credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.signing_secret.is_empty()
    }
}

impl Default for SlackSection {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            signing_secret: String::new(),
            listen_addr: "0.0.0.0:3000".to_owned(),
        }
    }
}

impl std::fmt::Debug for SlackSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSection")
            .field("has_bot_token", &!self.bot_token.is_empty())
            .field("has_signing_secret", &!self.signing_secret.is_empty())
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}

impl Serialize for SlackSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SlackSection", 1)?;
        // bot_token and signing_secret are intentionally omitted.
        state.serialize_field("listen_addr", &self.listen_addr)?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Per-crate tracing directives (e.g. `["warden_bridge=debug",
    /// "hyper=warn"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
