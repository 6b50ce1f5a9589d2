//! Control loop integration tests
//!
//! Drives the public API with scripted signal sources, failing stores and
//! misbehaving actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use autoloop::config::{ActionConfig, Config};
use autoloop::daemon::{ControlLoop, LoopConfig};
use autoloop::domain::{ActionRecord, Decision, Signal, signal_names};
use autoloop::error::{AutoloopError, Result};
use autoloop::executor::{Action, ActionOutcome, ActionRegistry, action_kinds};
use autoloop::policy::next_interval;
use autoloop::signals::{GatherContext, SignalSource};
use autoloop::storage::{JsonlStore, LoopStatsSummary, MemoryStore, PersistenceStore, StorageBackend};
use tempfile::TempDir;

struct FixedSource(Vec<Signal>);

#[async_trait]
impl SignalSource for FixedSource {
    async fn gather(&self, _ctx: &GatherContext) -> Result<Vec<Signal>> {
        Ok(self.0.clone())
    }
}

struct FailingSource;

#[async_trait]
impl SignalSource for FailingSource {
    async fn gather(&self, _ctx: &GatherContext) -> Result<Vec<Signal>> {
        Err(AutoloopError::SignalGathering("health endpoint unreachable".into()))
    }
}

struct FailingStore;

#[async_trait]
impl PersistenceStore for FailingStore {
    async fn append_decision(&self, _decision: &Decision) -> Result<()> {
        Err(AutoloopError::Persistence("disk full".into()))
    }

    async fn append_action(&self, _record: &ActionRecord) -> Result<()> {
        Err(AutoloopError::Persistence("disk full".into()))
    }

    async fn append_metric(&self, _name: &str, _value: f64, _context: &str) -> Result<()> {
        Err(AutoloopError::Persistence("disk full".into()))
    }

    async fn stats(&self) -> Result<LoopStatsSummary> {
        Err(AutoloopError::Persistence("disk full".into()))
    }
}

struct SlowStore;

#[async_trait]
impl PersistenceStore for SlowStore {
    async fn append_decision(&self, _decision: &Decision) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    async fn append_action(&self, _record: &ActionRecord) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    async fn append_metric(&self, _name: &str, _value: f64, _context: &str) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    async fn stats(&self) -> Result<LoopStatsSummary> {
        Ok(LoopStatsSummary::default())
    }
}

/// Fails every fifth call
struct ScriptedAction {
    kind: &'static str,
    calls: AtomicUsize,
}

impl ScriptedAction {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Action for ScriptedAction {
    fn kind(&self) -> &str {
        self.kind
    }

    async fn run(&self) -> Result<ActionOutcome> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 5 == 4 {
            Ok(ActionOutcome::failure("scripted failure"))
        } else {
            Ok(ActionOutcome::success(0.4))
        }
    }
}

/// Succeeds after a fixed delay
struct SleepyAction {
    kind: &'static str,
    delay: Duration,
}

impl SleepyAction {
    fn new(kind: &'static str, delay: Duration) -> Self {
        Self { kind, delay }
    }
}

#[async_trait]
impl Action for SleepyAction {
    fn kind(&self) -> &str {
        self.kind
    }

    async fn run(&self) -> Result<ActionOutcome> {
        tokio::time::sleep(self.delay).await;
        Ok(ActionOutcome::success(0.5))
    }
}

struct PanicAction;

#[async_trait]
impl Action for PanicAction {
    fn kind(&self) -> &str {
        action_kinds::EXPLORATION
    }

    async fn run(&self) -> Result<ActionOutcome> {
        panic!("action blew up");
    }
}

fn signals(time: f64, perf: f64, complexity: f64, exploration: f64, activity: f64) -> Vec<Signal> {
    vec![
        Signal::new(signal_names::TIME_SINCE_LAST_ACTION, time),
        Signal::new(signal_names::PERFORMANCE_FACTOR, perf),
        Signal::new(signal_names::COMPLEXITY_FACTOR, complexity),
        Signal::new(signal_names::EXPLORATION_FACTOR, exploration),
        Signal::new(signal_names::ACTIVITY_FACTOR, activity),
    ]
}

fn idle_source() -> Arc<dyn SignalSource> {
    Arc::new(FixedSource(signals(0.0, 0.0, 0.0, 0.0, 0.0)))
}

fn registry() -> Arc<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    for kind in [
        action_kinds::ROUTINE_MAINTENANCE,
        action_kinds::PERFORMANCE_OPTIMIZATION,
        action_kinds::COMPLEXITY_REDUCTION,
        action_kinds::EXPLORATION,
        action_kinds::ACTIVITY_RESPONSE,
    ] {
        registry.register(Arc::new(ScriptedAction::new(kind)));
    }
    Arc::new(registry)
}

/// Zero scores with a 600s base produce the maximum interval
fn long_sleep_config() -> LoopConfig {
    LoopConfig::default().with_intervals(
        Duration::from_secs(600),
        Duration::from_secs(30),
        Duration::from_secs(600),
    )
}

async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn test_start_twice_then_restart() {
    let control = ControlLoop::new(
        long_sleep_config(),
        idle_source(),
        registry(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    assert!(control.start().await);
    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions == 1).await);

    assert!(!control.start().await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(control.state().total_decisions, 1);
    assert!(control.is_running());

    control.stop().await;
    assert!(!control.is_running());

    assert!(control.start().await);
    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions == 2).await);
    control.stop().await;
    assert!(!control.status().running);
}

#[tokio::test]
async fn test_stop_during_long_sleep_is_prompt() {
    let control = ControlLoop::new(
        long_sleep_config(),
        idle_source(),
        registry(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    control.start().await;
    assert!(wait_until(Duration::from_secs(2), || control.state().last_interval.is_some()).await);
    assert_eq!(control.state().last_interval, Some(Duration::from_secs(600)));

    let started = Instant::now();
    control.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!control.is_running());
}

#[tokio::test]
async fn test_stop_aborts_worker_stuck_in_action() {
    let executor = Arc::new(ActionRegistry::new().with(Arc::new(SleepyAction::new(
        action_kinds::ROUTINE_MAINTENANCE,
        Duration::from_secs(600),
    ))));
    let config = LoopConfig::default().with_stop_timeout(Duration::from_millis(300));
    let control = ControlLoop::new(
        config,
        Arc::new(FixedSource(signals(1.0, 1.0, 1.0, 0.0, 0.0))),
        executor,
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    assert!(control.start().await);
    // The decision is counted before the action starts, so the worker is now stuck in it
    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions == 1).await);

    let started = Instant::now();
    assert!(control.stop().await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(2));
    assert!(!control.is_running());
    assert_eq!(control.state().total_actions, 0);

    assert!(control.start().await);
    assert!(control.is_running());
    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions == 2).await);
    control.stop().await;
    assert!(!control.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_and_stop_leave_no_stray_worker() {
    let config = LoopConfig::default()
        .with_intervals(
            Duration::from_millis(20),
            Duration::from_millis(10),
            Duration::from_millis(20),
        )
        .with_sleep_slice(Duration::from_millis(5));
    let control = Arc::new(ControlLoop::new(config, idle_source(), registry(), Arc::new(MemoryStore::new())).unwrap());

    for _ in 0..50 {
        let starter = {
            let control = control.clone();
            tokio::spawn(async move { control.start().await })
        };
        let stopper = {
            let control = control.clone();
            tokio::spawn(async move { control.stop().await })
        };
        let (started, stopped) = tokio::join!(starter, stopper);
        started.unwrap();
        stopped.unwrap();
    }

    // running flag and worker slot must agree
    let running = control.is_running();
    let joined = control.stop().await;
    assert_eq!(running, joined);
    assert!(!control.is_running());
    assert!(!control.stop().await);

    let settled = control.state().total_decisions;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(control.state().total_decisions, settled);
}

#[tokio::test]
async fn test_run_once_is_rejected_while_worker_runs() {
    let control = ControlLoop::new(
        long_sleep_config(),
        idle_source(),
        registry(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    control.start().await;
    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions == 1).await);

    let err = control.run_once().await.unwrap_err();
    assert!(matches!(err, AutoloopError::AlreadyRunning));
    assert_eq!(control.state().total_decisions, 1);
    assert_eq!(control.history().len(), 1);

    control.stop().await;
    let outcome = control.run_once().await.unwrap();
    assert!(!outcome.decision.acted);
    assert_eq!(control.state().total_decisions, 2);
}

#[tokio::test]
async fn test_stop_during_forced_action_discards_result() {
    let store = Arc::new(MemoryStore::new());
    let executor = Arc::new(ActionRegistry::new().with(Arc::new(SleepyAction::new(
        action_kinds::PERFORMANCE_OPTIMIZATION,
        Duration::from_millis(300),
    ))));
    let control = Arc::new(ControlLoop::new(long_sleep_config(), idle_source(), executor, store.clone()).unwrap());
    control.start().await;
    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions == 1).await);

    let forced = {
        let control = control.clone();
        tokio::spawn(async move {
            control
                .force_action(Some(action_kinds::PERFORMANCE_OPTIMIZATION))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(control.stop().await);

    let err = forced.await.unwrap().unwrap_err();
    assert!(matches!(err, AutoloopError::NotRunning));
    let state = control.state();
    assert_eq!(state.total_actions, 0);
    assert!(state.last_action_at.is_none());
    assert!(store.actions().is_empty());
}

#[tokio::test]
async fn test_force_action_on_stopped_loop_fails() {
    let control = ControlLoop::new(
        LoopConfig::default(),
        idle_source(),
        registry(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    let before = control.state();
    let err = control
        .force_action(Some(action_kinds::PERFORMANCE_OPTIMIZATION))
        .await
        .unwrap_err();
    assert!(matches!(err, AutoloopError::NotRunning));
    assert_eq!(control.state(), before);
}

#[tokio::test]
async fn test_force_action_persists_and_counts() {
    let store = Arc::new(MemoryStore::new());
    let control = ControlLoop::new(long_sleep_config(), idle_source(), registry(), store.clone()).unwrap();
    control.start().await;

    let result = control
        .force_action(Some(action_kinds::PERFORMANCE_OPTIMIZATION))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.kind, action_kinds::PERFORMANCE_OPTIMIZATION);

    // No kind: round-robin fallback starts at the first action in the set
    let fallback = control.force_action(None).await.unwrap();
    assert_eq!(fallback.kind, action_kinds::ROUTINE_MAINTENANCE);

    let state = control.state();
    assert_eq!(state.total_actions, 2);
    assert_eq!(state.successful_actions, 2);
    assert!(state.last_action_at.is_some());

    let records = store.actions();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.forced && r.decision_id.is_none()));

    control.stop().await;
}

#[tokio::test]
async fn test_gather_failure_does_not_count_a_decision() {
    let store = Arc::new(MemoryStore::new());
    let control = ControlLoop::new(LoopConfig::default(), Arc::new(FailingSource), registry(), store.clone()).unwrap();

    control.start().await;
    assert!(wait_until(Duration::from_secs(2), || control.state().gather_failures == 1).await);

    let status = control.status();
    assert!(status.running);
    assert_eq!(status.total_decisions, 0);
    assert!(status.recent_decisions.is_empty());
    assert!(store.decisions().is_empty());

    // Worker is in its 60s backoff; stop must still be prompt
    let started = Instant::now();
    control.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_failing_store_does_not_break_the_loop() {
    let control = ControlLoop::new(
        LoopConfig::default(),
        Arc::new(FixedSource(signals(1.0, 1.0, 1.0, 0.0, 0.0))),
        registry(),
        Arc::new(FailingStore),
    )
    .unwrap();

    let outcome = control.run_once().await.unwrap();
    assert!(outcome.decision.acted);
    assert!(outcome.action.unwrap().success);

    let state = control.state();
    assert_eq!(state.total_decisions, 1);
    assert_eq!(state.total_actions, 1);
    // decision, decision_score, action, action_impact, next_interval_secs
    assert_eq!(state.persistence_failures, 5);
    assert_eq!(control.history().len(), 1);

    let err = control.stats().await.unwrap_err();
    assert!(matches!(err, AutoloopError::Persistence(_)));
}

#[tokio::test]
async fn test_slow_store_is_bounded_by_call_timeout() {
    let config = LoopConfig::default().with_call_timeout(Duration::from_millis(50));
    let control = ControlLoop::new(config, idle_source(), registry(), Arc::new(SlowStore)).unwrap();

    let started = Instant::now();
    let outcome = control.run_once().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!outcome.decision.acted);
    // decision, decision_score, next_interval_secs
    assert_eq!(control.state().persistence_failures, 3);
}

#[tokio::test]
async fn test_panicking_action_is_recorded_as_failure() {
    let store = Arc::new(MemoryStore::new());
    let executor = Arc::new(ActionRegistry::new().with(Arc::new(PanicAction)));
    let control = ControlLoop::new(long_sleep_config(), idle_source(), executor, store.clone()).unwrap();
    control.start().await;

    let result = control.force_action(Some(action_kinds::EXPLORATION)).await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("action blew up"));

    let state = control.state();
    assert_eq!(state.total_actions, 1);
    assert_eq!(state.successful_actions, 0);
    assert!(control.is_running());
    assert!(!store.actions()[0].success);

    control.stop().await;
}

#[tokio::test]
async fn test_unknown_action_kind_is_a_failed_result() {
    let control = ControlLoop::new(
        long_sleep_config(),
        idle_source(),
        Arc::new(ActionRegistry::new()),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    control.start().await;

    let result = control.force_action(Some("defragment")).await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Unknown action: defragment"));
    assert_eq!(control.state().total_actions, 1);

    control.stop().await;
}

#[tokio::test]
async fn test_history_ring_holds_cap() {
    let config = LoopConfig::default().with_history_cap(10);
    let control = ControlLoop::new(config, idle_source(), registry(), Arc::new(MemoryStore::new())).unwrap();

    let mut ids = Vec::new();
    for _ in 0..15 {
        ids.push(control.run_once().await.unwrap().decision.id);
    }

    let history = control.history();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].id, ids[5]);
    assert_eq!(history[9].id, ids[14]);
    assert_eq!(control.state().total_decisions, 15);
}

#[tokio::test]
async fn test_interval_adapts_to_success_rate() {
    // threshold above the scripted score so run_once never acts
    let config = LoopConfig::default().with_threshold(0.8);
    let control = ControlLoop::new(
        config,
        Arc::new(FixedSource(signals(1.0, 1.0, 0.75, 0.0, 0.0))),
        registry(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    control.start().await;

    for _ in 0..10 {
        control
            .force_action(Some(action_kinds::COMPLEXITY_REDUCTION))
            .await
            .unwrap();
    }
    let state = control.state();
    assert_eq!(state.total_actions, 10);
    assert_eq!(state.successful_actions, 8);
    assert!((state.success_rate() - 0.8).abs() < 1e-9);

    control.stop().await;

    let outcome = control.run_once().await.unwrap();
    assert!((outcome.decision.score - 0.7).abs() < 1e-9);
    assert!(!outcome.decision.acted);
    // 60 * 0.3 * 0.9 = 16.2, floored to the 30s minimum
    assert_eq!(outcome.next_interval, Duration::from_secs(30));

    let unclamped = next_interval(
        0.2,
        0.8,
        Duration::from_secs(60),
        Duration::from_secs(30),
        Duration::from_secs(600),
    );
    assert!((unclamped.as_secs_f64() - 43.2).abs() < 1e-6);
}

#[tokio::test]
async fn test_configured_loop_with_jsonl_and_commands() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Jsonl;
    config.storage.dir = temp.path().to_path_buf();
    config.control.action_threshold = 0.5;
    config.signals.exploration_seed = Some(1);
    config.actions = vec![
        ActionConfig {
            kind: action_kinds::ROUTINE_MAINTENANCE.into(),
            command: "true".into(),
            timeout_ms: 5000,
            impact: 0.9,
        },
        ActionConfig {
            kind: action_kinds::PERFORMANCE_OPTIMIZATION.into(),
            command: "exit 3".into(),
            timeout_ms: 5000,
            impact: 0.9,
        },
    ];

    let control = config.build_loop().unwrap();
    control.start().await;

    let ok = control.force_action(Some(action_kinds::ROUTINE_MAINTENANCE)).await.unwrap();
    assert!(ok.success);
    assert_eq!(ok.impact, 0.9);

    let bad = control
        .force_action(Some(action_kinds::PERFORMANCE_OPTIMIZATION))
        .await
        .unwrap();
    assert!(!bad.success);
    assert_eq!(bad.impact, 0.0);

    assert!(wait_until(Duration::from_secs(2), || control.state().total_decisions >= 1).await);
    control.stop().await;

    let store = JsonlStore::new(temp.path()).unwrap();
    let actions = store.actions().await.unwrap();
    assert_eq!(actions.len(), 2);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_actions, 2);
    assert_eq!(stats.successful_actions, 1);
    assert!(stats.total_decisions >= 1);
}
