use super::*;

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::oneshot;
use warden_test::test_key;

/// Executor whose runs finish only when the test says so.
#[derive(Default)]
struct ManualState {
    pending: HashMap<String, oneshot::Sender<ExecutionOutcome>>,
    started: Vec<(ConversationKey, String)>,
    finished: Vec<(String, ExecutionOutcome)>,
    running_keys: HashSet<ConversationKey>,
    running: usize,
    max_running: usize,
    overlap: bool,
}

#[derive(Clone, Default)]
struct ManualExecutor {
    state: Arc<Mutex<ManualState>>,
    changed: Arc<Notify>,
}

impl ManualExecutor {
    fn started(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.started.iter().map(|(_, p)| p.clone()).collect()
    }

    fn finished(&self) -> Vec<(String, ExecutionOutcome)> {
        self.state.lock().unwrap().finished.clone()
    }

    fn max_running(&self) -> usize {
        self.state.lock().unwrap().max_running
    }

    fn saw_overlap(&self) -> bool {
        self.state.lock().unwrap().overlap
    }

    fn finish(&self, payload: &str) {
        let tx = self.state.lock().unwrap().pending.remove(payload);
        tx.expect("payload is not running")
            .send(ExecutionOutcome::Completed)
            .unwrap();
    }

    async fn wait_until(&self, check: impl Fn(&ManualState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let changed = self.changed.notified();
                if check(&self.state.lock().unwrap()) {
                    return;
                }
                changed.await;
            }
        })
        .await
        .expect("condition not reached");
    }

    async fn wait_started(&self, n: usize) {
        self.wait_until(|s| s.started.len() >= n).await;
    }

    async fn wait_finished(&self, n: usize) {
        self.wait_until(|s| s.finished.len() >= n).await;
    }
}

#[async_trait]
impl Executor<String> for ManualExecutor {
    async fn execute(
        &self,
        key: ConversationKey,
        payload: String,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        assert_ne!(payload, "panic", "executor panicked");
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().unwrap();
            if !state.running_keys.insert(key.clone()) {
                state.overlap = true;
            }
            state.pending.insert(payload.clone(), tx);
            state.started.push((key.clone(), payload.clone()));
            state.running = state.running.saturating_add(1);
            state.max_running = state.max_running.max(state.running);
        }
        self.changed.notify_waiters();

        let outcome = tokio::select! {
            outcome = rx => outcome.unwrap_or(ExecutionOutcome::Cancelled),
            () = cancel.cancelled() => ExecutionOutcome::Cancelled,
        };

        {
            let mut state = self.state.lock().unwrap();
            state.running_keys.remove(&key);
            state.running = state.running.saturating_sub(1);
            state.pending.remove(&payload);
            state.finished.push((payload, outcome.clone()));
        }
        self.changed.notify_waiters();
        outcome
    }
}

fn controller(max_concurrency: usize) -> (AdmissionController<String>, ManualExecutor) {
    bounded(max_concurrency, 0)
}

fn bounded(max_concurrency: usize, max_queue: usize) -> (AdmissionController<String>, ManualExecutor) {
    let executor = ManualExecutor::default();
    let controller = AdmissionController::new(
        Arc::new(executor.clone()),
        AdmissionLimits {
            max_concurrency,
            max_queue_per_conversation: max_queue,
        },
    );
    (controller, executor)
}

fn submit(c: &AdmissionController<String>, user: &str, payload: &str) -> Admission {
    c.submit(test_key(user), payload.to_string()).unwrap()
}

#[tokio::test]
async fn test_other_conversation_waits_for_global_capacity() {
    let (c, exec) = controller(1);

    assert_eq!(submit(&c, "A", "a1"), Admission::Started);
    assert_eq!(submit(&c, "B", "b1"), Admission::Queued { position: 1 });

    exec.wait_started(1).await;
    tokio::task::yield_now().await;
    assert_eq!(exec.started(), vec!["a1"]);

    exec.finish("a1");
    exec.wait_started(2).await;
    assert_eq!(exec.started(), vec!["a1", "b1"]);

    exec.finish("b1");
    c.wait_idle().await;
    assert_eq!(exec.max_running(), 1);
}

#[tokio::test]
async fn test_same_conversation_runs_in_arrival_order() {
    let (c, exec) = controller(4);

    assert_eq!(submit(&c, "A", "1"), Admission::Started);
    assert_eq!(submit(&c, "A", "2"), Admission::Queued { position: 1 });
    assert_eq!(submit(&c, "A", "3"), Admission::Queued { position: 2 });

    exec.wait_started(1).await;
    exec.finish("1");
    exec.wait_started(2).await;
    exec.finish("2");
    exec.wait_started(3).await;
    exec.finish("3");
    c.wait_idle().await;

    assert_eq!(exec.started(), vec!["1", "2", "3"]);
    let finished: Vec<String> = exec.finished().into_iter().map(|(p, _)| p).collect();
    assert_eq!(finished, vec!["1", "2", "3"]);
    assert!(!exec.saw_overlap());
}

#[tokio::test]
async fn test_busy_conversation_queues_even_with_free_capacity() {
    let (c, exec) = controller(3);

    assert_eq!(submit(&c, "A", "a1"), Admission::Started);
    assert_eq!(submit(&c, "A", "a2"), Admission::Queued { position: 1 });
    assert_eq!(submit(&c, "B", "b1"), Admission::Started);

    let stats = c.stats();
    assert_eq!(stats.active, 2);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.queued_conversations, 1);
    assert_eq!(stats.max_concurrency, 3);

    exec.wait_started(2).await;
    exec.finish("a1");
    exec.finish("b1");
    exec.wait_started(3).await;
    exec.finish("a2");
    c.wait_idle().await;
}

#[tokio::test]
async fn test_concurrency_cap_and_serialization_hold_under_load() {
    let (c, exec) = controller(3);
    let users = ["A", "B", "C", "D", "E"];
    let mut payloads = Vec::new();
    for round in 0..4 {
        for user in users {
            let payload = format!("{user}{round}");
            c.submit(test_key(user), payload.clone()).unwrap();
            payloads.push(payload);
        }
    }

    let mut done: usize = 0;
    while done < payloads.len() {
        exec.wait_until(|s| !s.pending.is_empty()).await;
        let running: Vec<String> = exec.state.lock().unwrap().pending.keys().cloned().collect();
        assert!(c.stats().active <= 3);
        for p in running {
            exec.finish(&p);
            done = done.saturating_add(1);
        }
        exec.wait_finished(done).await;
    }
    c.wait_idle().await;

    assert!(exec.max_running() <= 3);
    assert!(!exec.saw_overlap());

    // Per-conversation FIFO.
    let started = exec.started();
    for user in users {
        let mine: Vec<&String> = started.iter().filter(|p| p.starts_with(user)).collect();
        let expected: Vec<String> = (0..4).map(|r| format!("{user}{r}")).collect();
        assert_eq!(mine, expected.iter().collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_release_of_inactive_key_is_a_no_op() {
    let (c, exec) = controller(1);
    submit(&c, "A", "a1");
    submit(&c, "B", "b1");
    exec.wait_started(1).await;

    c.release(&test_key("B"), &ExecutionOutcome::Completed);
    c.release(&test_key("Z"), &ExecutionOutcome::Completed);

    let stats = c.stats();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(exec.started(), vec!["a1"]);

    exec.finish("a1");
    exec.wait_started(2).await;
    exec.finish("b1");
    c.wait_idle().await;
}

#[tokio::test]
async fn test_each_release_starts_at_most_one() {
    let (c, exec) = controller(2);
    submit(&c, "A", "a1");
    submit(&c, "B", "b1");
    submit(&c, "C", "c1");
    submit(&c, "D", "d1");
    exec.wait_started(2).await;

    exec.finish("a1");
    exec.wait_started(3).await;
    tokio::task::yield_now().await;
    assert_eq!(c.stats().active, 2);
    assert_eq!(exec.started(), vec!["a1", "b1", "c1"]);

    exec.finish("b1");
    exec.wait_started(4).await;
    assert_eq!(exec.started()[3], "d1");

    exec.finish("c1");
    exec.finish("d1");
    c.wait_idle().await;
}

#[tokio::test]
async fn test_empty_queues_are_removed() {
    let (c, exec) = controller(1);
    submit(&c, "A", "a1");
    submit(&c, "B", "b1");
    assert_eq!(c.stats().queued_conversations, 1);

    exec.wait_started(1).await;
    exec.finish("a1");
    exec.wait_started(2).await;
    assert_eq!(c.stats().queued_conversations, 0);
    assert_eq!(c.stats().queued, 0);

    exec.finish("b1");
    c.wait_idle().await;
}

#[tokio::test]
async fn test_cancel_reports_cancelled_and_frees_slot() {
    let (c, exec) = controller(1);
    let key = test_key("A");
    submit(&c, "A", "a1");
    submit(&c, "B", "b1");
    exec.wait_started(1).await;

    assert!(c.is_active(&key));
    assert!(c.cancel(&key));
    exec.wait_started(2).await;
    assert_eq!(
        exec.finished()[0],
        ("a1".to_string(), ExecutionOutcome::Cancelled)
    );

    assert!(!c.cancel(&test_key("nobody")));
    exec.finish("b1");
    c.wait_idle().await;
}

#[tokio::test]
async fn test_clear_queue_drops_waiting_items() {
    let (c, exec) = controller(2);
    let key = test_key("A");
    submit(&c, "A", "a1");
    submit(&c, "A", "a2");
    submit(&c, "A", "a3");

    assert_eq!(c.clear_queue(&key), 2);
    assert_eq!(c.clear_queue(&key), 0);
    assert_eq!(c.stats().queued, 0);

    exec.wait_started(1).await;
    exec.finish("a1");
    c.wait_idle().await;
    assert_eq!(exec.started(), vec!["a1"]);
}

#[tokio::test]
async fn test_bounded_queue_rejects_beyond_depth() {
    let (c, exec) = bounded(1, 2);
    assert_eq!(submit(&c, "A", "a1"), Admission::Started);
    assert_eq!(submit(&c, "A", "a2"), Admission::Queued { position: 1 });
    assert_eq!(submit(&c, "A", "a3"), Admission::Queued { position: 2 });
    assert_eq!(submit(&c, "A", "a4"), Admission::Rejected { depth: 2 });
    // Bound is per conversation.
    assert_eq!(submit(&c, "B", "b1"), Admission::Queued { position: 1 });

    c.shutdown();
    exec.wait_finished(1).await;
    c.wait_idle().await;
}

#[tokio::test]
async fn test_zero_concurrency_is_raised_to_one() {
    let (c, exec) = controller(0);
    assert_eq!(c.stats().max_concurrency, 1);
    assert_eq!(submit(&c, "A", "a1"), Admission::Started);
    exec.wait_started(1).await;
    exec.finish("a1");
    c.wait_idle().await;
}

#[tokio::test]
async fn test_shutdown_cancels_active_and_discards_queues() {
    let (c, exec) = controller(1);
    submit(&c, "A", "a1");
    submit(&c, "A", "a2");
    submit(&c, "B", "b1");
    exec.wait_started(1).await;

    assert_eq!(c.shutdown(), 2);
    c.wait_idle().await;

    assert_eq!(exec.started(), vec!["a1"]);
    assert_eq!(
        exec.finished(),
        vec![("a1".to_string(), ExecutionOutcome::Cancelled)]
    );
    assert!(matches!(
        c.submit(test_key("C"), "c1".to_string()),
        Err(AdmissionError::ShuttingDown)
    ));
}

#[tokio::test]
async fn test_wait_idle_returns_immediately_when_idle() {
    let (c, _exec) = controller(1);
    tokio::time::timeout(Duration::from_secs(1), c.wait_idle())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_executor_panic_still_releases_slot() {
    let (c, exec) = controller(1);
    submit(&c, "A", "panic");
    assert_eq!(submit(&c, "B", "b1"), Admission::Queued { position: 1 });

    exec.wait_started(1).await;
    assert_eq!(exec.started(), vec!["b1"]);
    exec.finish("b1");
    c.wait_idle().await;
}
