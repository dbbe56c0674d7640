//! Periodic garbage collection of idle conversation sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use warden_core::{AgentEngine, ConversationKey, SessionStore};

/// Reports whether a conversation currently has a running execution.
pub(crate) type BusyCheck = Arc<dyn Fn(&ConversationKey) -> bool + Send + Sync>;

/// Remove sessions idle for at least `idle` and end their engine-side
/// sessions. Conversations `busy` reports as running are skipped, since a
/// long tool run emits no events. Returns how many sessions were removed.
pub(crate) async fn sweep_once(
    sessions: &dyn SessionStore,
    engine: &dyn AgentEngine,
    idle: Duration,
    busy: &(dyn Fn(&ConversationKey) -> bool + Sync),
) -> usize {
    let removed = sessions.cleanup_inactive(idle, busy).await;
    for session in &removed {
        if let Some(id) = &session.engine_session_id
            && let Err(e) = engine.end_session(id).await
        {
            warn!(conversation = %session.key, session_id = %id, error = %e, "failed to end agent session");
        }
    }
    if !removed.is_empty() {
        info!(removed = removed.len(), "swept idle sessions");
    }
    removed.len()
}

/// Run [`sweep_once`] every `every` until the task is aborted.
pub(crate) fn spawn_session_sweep(
    sessions: Arc<dyn SessionStore>,
    engine: Arc<dyn AgentEngine>,
    idle: Duration,
    every: Duration,
    busy: BusyCheck,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(sessions.as_ref(), engine.as_ref(), idle, busy.as_ref()).await;
        }
    })
}
