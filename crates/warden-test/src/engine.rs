//! Scripted agent engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Notify;

use warden_core::{AgentEngine, AgentEvent, EngineError, EngineRequest, EngineResult, EventStream};

/// One step of a scripted execution.
#[derive(Debug)]
pub enum ScriptStep {
    /// Yield an event.
    Emit(AgentEvent),
    /// Yield an error.
    Fail(EngineError),
    /// Block until the notify is signalled.
    Wait(Arc<Notify>),
    /// Never yield again (the stream only ends by being dropped).
    Hang,
}

#[derive(Debug, Default)]
struct EngineState {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<EngineRequest>>,
    ended: Mutex<Vec<String>>,
    started: Notify,
}

/// Mock [`AgentEngine`] that plays back queued scripts, one per execution.
///
/// When the script queue is empty an execution completes immediately.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<EngineState>,
}

impl ScriptedEngine {
    /// Create an engine with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next unscripted execution.
    #[must_use]
    pub fn with_script(self, steps: Vec<ScriptStep>) -> Self {
        self.push_script(steps);
        self
    }

    /// Queue a script that emits `events` in order.
    #[must_use]
    pub fn with_events(self, events: Vec<AgentEvent>) -> Self {
        self.with_script(events.into_iter().map(ScriptStep::Emit).collect())
    }

    /// Queue a script.
    pub fn push_script(&self, steps: Vec<ScriptStep>) {
        if let Ok(mut guard) = self.state.scripts.lock() {
            guard.push_back(steps);
        }
    }

    /// Requests received so far, in start order.
    #[must_use]
    pub fn requests(&self) -> Vec<EngineRequest> {
        self.state
            .requests
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Prompts received so far, in start order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }

    /// Engine sessions destroyed through `end_session`.
    #[must_use]
    pub fn ended_sessions(&self) -> Vec<String> {
        self.state
            .ended
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Wait until at least `n` executions have started.
    pub async fn wait_for_starts(&self, n: usize) {
        loop {
            let started = self.state.started.notified();
            if self.requests().len() >= n {
                return;
            }
            started.await;
        }
    }
}

#[async_trait]
impl AgentEngine for ScriptedEngine {
    fn stream(&self, request: EngineRequest) -> EventStream {
        let steps: VecDeque<ScriptStep> = self
            .state
            .scripts
            .lock()
            .ok()
            .and_then(|mut g| g.pop_front())
            .unwrap_or_else(|| {
                vec![ScriptStep::Emit(AgentEvent::Completed {
                    result: None,
                    is_error: false,
                })]
            })
            .into();
        if let Ok(mut guard) = self.state.requests.lock() {
            guard.push(request);
        }
        self.state.started.notify_waiters();

        futures::stream::unfold(steps, |mut steps| async move {
            loop {
                match steps.pop_front()? {
                    ScriptStep::Emit(event) => return Some((Ok(event), steps)),
                    ScriptStep::Fail(err) => return Some((Err(err), steps)),
                    ScriptStep::Wait(notify) => notify.notified().await,
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                }
            }
        })
        .boxed()
    }

    async fn end_session(&self, session_id: &str) -> EngineResult<()> {
        if let Ok(mut guard) = self.state.ended.lock() {
            guard.push(session_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{test_engine_request, test_key, test_success_events};

    #[tokio::test]
    async fn test_plays_script_in_order() {
        let engine = ScriptedEngine::new().with_events(test_success_events("s-1", "hello"));
        let events: Vec<_> = engine
            .stream(test_engine_request(&test_key("U1"), "hi"))
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(events[2].as_ref().unwrap().is_terminal());
        assert_eq!(engine.prompts(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_unscripted_execution_completes() {
        let engine = ScriptedEngine::new();
        let events: Vec<_> = engine
            .stream(test_engine_request(&test_key("U1"), "hi"))
            .collect()
            .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_step_blocks_until_notified() {
        let release = Arc::new(Notify::new());
        let engine = ScriptedEngine::new().with_script(vec![
            ScriptStep::Wait(Arc::clone(&release)),
            ScriptStep::Emit(AgentEvent::Completed {
                result: None,
                is_error: false,
            }),
        ]);
        let mut stream = engine.stream(test_engine_request(&test_key("U1"), "hi"));

        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), stream.next()).await;
        assert!(pending.is_err());

        release.notify_one();
        let event = stream.next().await.unwrap().unwrap();
        assert!(event.is_terminal());
    }

    #[tokio::test]
    async fn test_end_session_is_recorded() {
        let engine = ScriptedEngine::new();
        engine.end_session("s-9").await.unwrap();
        assert_eq!(engine.ended_sessions(), vec!["s-9"]);
    }
}
