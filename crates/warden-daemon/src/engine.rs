//! Agent engine backed by a CLI subprocess that prints line-delimited JSON.
//!
//! Each execution runs `<command> <args...> -p <prompt> --output-format
//! stream-json --verbose [--resume <session>] --mcp-config <json>
//! --permission-prompt-tool mcp__warden__approve` in the session's working
//! directory. The MCP config starts `warden-permission` with the approval
//! route in its environment, so every consent prompt reaches the bridge.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use warden_config::AgentSection;
use warden_core::{AgentEngine, AgentEvent, EngineError, EngineRequest, EngineResult, EventStream};
use warden_permission::{PROMPT_TOOL, mcp_config};

/// Buffered events per execution before the reader waits on the consumer.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Line {
    System {
        subtype: Option<String>,
        session_id: Option<String>,
    },
    Assistant {
        message: AssistantMessage,
    },
    Result {
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// Translate one output line into zero or more events.
pub(crate) fn parse_line(line: &str) -> EngineResult<Vec<AgentEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Line =
        serde_json::from_str(line).map_err(|e| EngineError::Protocol(e.to_string()))?;

    let events = match parsed {
        Line::System {
            subtype: Some(subtype),
            session_id: Some(session_id),
        } if subtype == "init" => vec![AgentEvent::Init { session_id }],
        Line::System { .. } | Line::Other => Vec::new(),
        Line::Assistant { message } => message
            .content
            .into_iter()
            .filter_map(|content| match content {
                Content::Text { text } => Some(AgentEvent::Text { text }),
                Content::ToolUse { name, input } => Some(AgentEvent::ToolUse { name, input }),
                Content::Other => None,
            })
            .collect(),
        Line::Result { result, is_error } => vec![AgentEvent::Completed { result, is_error }],
    };
    Ok(events)
}

/// Runs the configured agent CLI once per execution.
#[derive(Debug, Clone)]
pub(crate) struct CommandEngine {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    permission_command: PathBuf,
}

impl CommandEngine {
    pub(crate) fn new(
        command: impl Into<String>,
        args: Vec<String>,
        permission_command: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            permission_command: permission_command.into(),
        }
    }

    pub(crate) fn from_section(section: &AgentSection, permission_command: PathBuf) -> Self {
        Self {
            env: section.extra_env.clone(),
            ..Self::new(
                section.command.clone(),
                section.args.clone(),
                permission_command,
            )
        }
    }

    fn command(&self, request: &EngineRequest) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg("-p")
            .arg(&request.prompt)
            .args(["--output-format", "stream-json", "--verbose"]);
        if let Some(session) = &request.resume_session {
            cmd.arg("--resume").arg(session);
        }
        cmd.arg("--mcp-config")
            .arg(mcp_config(&self.permission_command, &request.approval).to_string())
            .args(["--permission-prompt-tool", PROMPT_TOOL]);
        cmd.envs(&self.env)
            .envs(request.approval.to_env())
            .current_dir(&request.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AgentEngine for CommandEngine {
    fn stream(&self, request: EngineRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut cmd = self.command(&request);
        let cancel = request.cancel.clone();
        let command = self.command.clone();

        tokio::spawn(async move {
            match cmd.spawn() {
                Ok(child) => {
                    debug!(%command, pid = ?child.id(), "agent process started");
                    pump(child, cancel, tx).await;
                },
                Err(e) => {
                    warn!(%command, error = %e, "failed to start agent process");
                    let _ = tx.send(Err(EngineError::Spawn(e.to_string()))).await;
                },
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }

    async fn end_session(&self, session_id: &str) -> EngineResult<()> {
        // The CLI keeps sessions on disk; nothing is held in this process.
        debug!(session_id, "released agent session");
        Ok(())
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "agent process already gone");
    }
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stderr = %line, "agent");
    }
}

/// Forward the child's events until it exits, the execution is cancelled,
/// or the consumer goes away.
async fn pump(
    mut child: Child,
    cancel: CancellationToken,
    tx: mpsc::Sender<EngineResult<AgentEvent>>,
) {
    let Some(stdout) = child.stdout.take() else {
        let _ = tx
            .send(Err(EngineError::Io("agent stdout not captured".into())))
            .await;
        kill(&mut child).await;
        return;
    };
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(log_stderr(stderr));
    }

    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("execution cancelled, stopping agent process");
                kill(&mut child).await;
                return;
            },
            () = tx.closed() => {
                kill(&mut child).await;
                return;
            },
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(events) => {
                    for event in events {
                        if tx.send(Ok(event)).await.is_err() {
                            kill(&mut child).await;
                            return;
                        }
                    }
                },
                Err(e) => warn!(error = %e, "skipping unparseable agent output"),
            },
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(EngineError::Io(e.to_string()))).await;
                kill(&mut child).await;
                return;
            },
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {},
        Ok(status) => {
            let _ = tx
                .send(Err(EngineError::Exited {
                    code: status.code(),
                }))
                .await;
        },
        Err(e) => {
            let _ = tx.send(Err(EngineError::Io(e.to_string()))).await;
        },
    }
}
