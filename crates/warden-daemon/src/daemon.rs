//! Wiring of the running daemon and its shutdown sequence.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use warden_admission::{AdmissionController, AdmissionLimits, AgentExecutor, SessionMap};
use warden_approval::ApprovalGate;
use warden_bridge::ApprovalBridge;
use warden_config::{AdmissionSection, AgentSection, Config, SessionsSection};
use warden_core::{AgentEngine, ConversationKey, EventSink, SessionStore};
use warden_slack::{SignatureVerifier, SlackApi, SlackEventSink, SlackPromptChannel, SlackState};

use crate::engine::CommandEngine;
use crate::sweep::{BusyCheck, spawn_session_sweep};

/// How long running executions get to observe cancellation on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Consent server binary installed alongside `wardend`.
const PERMISSION_BINARY: &str = "warden-permission";

pub(crate) fn admission_limits(section: &AdmissionSection) -> AdmissionLimits {
    AdmissionLimits {
        max_concurrency: section.max_concurrency,
        max_queue_per_conversation: section.max_queue_per_conversation,
    }
}

pub(crate) fn working_directory(section: &SessionsSection) -> Result<PathBuf> {
    if section.default_working_directory.is_empty() {
        std::env::current_dir().context("cannot determine the current directory")
    } else {
        Ok(PathBuf::from(&section.default_working_directory))
    }
}

/// Locate the consent server the agent launches for tool approvals.
///
/// Without it the agent would have no way to ask for consent, so a missing
/// binary stops startup.
pub(crate) fn permission_command(section: &AgentSection) -> Result<PathBuf> {
    let path = if section.permission_command.is_empty() {
        std::env::current_exe()
            .context("cannot locate the wardend executable")?
            .with_file_name(format!("{PERMISSION_BINARY}{}", std::env::consts::EXE_SUFFIX))
    } else {
        PathBuf::from(&section.permission_command)
    };
    if !path.is_file() {
        bail!(
            "consent server {} not found (set agent.permission_command)",
            path.display()
        );
    }
    Ok(path)
}

fn busy_check(admission: &AdmissionController<String>) -> BusyCheck {
    let admission = admission.clone();
    Arc::new(move |key: &ConversationKey| admission.is_active(key))
}

/// Run until Ctrl-C, then shut down in order: Slack intake, admission,
/// approval bridge.
pub(crate) async fn run(config: Config) -> Result<()> {
    if !config.slack.is_configured() {
        bail!("slack.bot_token and slack.signing_secret must be set (or SLACK_BOT_TOKEN / SLACK_SIGNING_SECRET)");
    }

    let permission_command = permission_command(&config.agent)?;

    let api = Arc::new(SlackApi::new(config.slack.bot_token.clone()));
    let sink: Arc<dyn EventSink> = Arc::new(SlackEventSink::new(Arc::clone(&api)));
    let gate = ApprovalGate::new(
        Arc::new(SlackPromptChannel::new(Arc::clone(&api))),
        Duration::from_secs(config.approval.timeout_secs),
    );

    // The bridge comes first so its URL can be handed to every execution.
    let bridge_host: IpAddr = config
        .approval
        .bridge_host
        .parse()
        .context("approval.bridge_host is not an IP address")?;
    let bridge = ApprovalBridge::bind(gate.clone(), bridge_host, config.approval.bridge_port)
        .await
        .context("failed to start the approval bridge")?;

    let sessions: Arc<dyn SessionStore> =
        Arc::new(SessionMap::new(working_directory(&config.sessions)?));
    let engine: Arc<dyn AgentEngine> = Arc::new(CommandEngine::from_section(&config.agent, permission_command));
    let executor = AgentExecutor::new(
        Arc::clone(&engine),
        Arc::clone(&sessions),
        Arc::clone(&sink),
        bridge.url(),
    );
    let admission = AdmissionController::new(
        Arc::new(executor),
        admission_limits(&config.admission),
    );

    let sweep = spawn_session_sweep(
        Arc::clone(&sessions),
        Arc::clone(&engine),
        Duration::from_secs(config.sessions.idle_timeout_secs),
        Duration::from_secs(config.sessions.sweep_interval_secs),
        busy_check(&admission),
    );

    let listen: SocketAddr = config
        .slack
        .listen_addr
        .parse()
        .context("slack.listen_addr is not a socket address")?;
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind Slack listener on {listen}"))?;
    let app = warden_slack::router(SlackState {
        gate,
        admission: admission.clone(),
        sink,
        verifier: SignatureVerifier::new(config.slack.signing_secret.clone()),
    });
    let stop_intake = CancellationToken::new();
    let signal = stop_intake.clone();
    let intake = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    });

    info!(
        slack = %listen,
        bridge = %bridge.local_addr(),
        max_concurrency = config.admission.max_concurrency,
        "wardend ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");

    stop_intake.cancel();
    match intake.await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => warn!(error = %e, "Slack listener failed"),
        Err(e) => warn!(error = %e, "Slack listener task ended abnormally"),
    }

    let discarded = admission.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, admission.wait_idle())
        .await
        .is_err()
    {
        warn!(stats = ?admission.stats(), "executions still running after grace period");
    }

    let drained = bridge.shutdown().await?;
    sweep.abort();

    info!(discarded, drained, "wardend stopped");
    Ok(())
}
