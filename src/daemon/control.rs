//! ControlLoop - lifecycle and control API for one decision loop.
//!
//! States: Stopped -> Running -> Stopped, restartable. One background worker
//! task per running loop; status readers share a lock with it.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::daemon::status::LoopStatusView;
use crate::daemon::worker;
use crate::domain::{ActionResult, Decision, LoopState};
use crate::error::{AutoloopError, Result};
use crate::executor::{ActionExecutor, ActionSelector, SelectorConfig};
use crate::history::{DEFAULT_HISTORY_CAP, HistoryRing};
use crate::policy::{
    DEFAULT_ACTION_THRESHOLD, DEFAULT_BASE_INTERVAL, DEFAULT_MAX_INTERVAL, DEFAULT_MIN_INTERVAL, DecisionPolicy,
    IntervalTuner, WeightTable,
};
use crate::signals::SignalSource;
use crate::storage::{LoopStatsSummary, PersistenceStore};

/// Default cancellation check granularity.
pub const DEFAULT_SLEEP_SLICE: Duration = Duration::from_secs(1);
/// Default delay after a failed gather.
pub const DEFAULT_GATHER_BACKOFF: Duration = Duration::from_secs(60);
/// Default bound on one store or monitor call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);
/// Default bound on joining the worker in `stop()`.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of decisions in a status snapshot.
pub const DEFAULT_STATUS_TAIL: usize = 5;

/// Runtime configuration for a control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Signal weights
    pub weights: WeightTable,
    /// Score above which the loop acts, in (0, 1)
    pub action_threshold: f64,
    pub base_interval: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Decisions kept in memory
    pub history_cap: usize,
    /// Granularity of the cancellable sleep
    pub sleep_slice: Duration,
    /// Sleep after a gather failure
    pub gather_backoff: Duration,
    /// Bound on each store call
    pub call_timeout: Duration,
    /// Bound on joining the worker
    pub stop_timeout: Duration,
    /// Decisions included in status snapshots
    pub status_tail: usize,
    /// Action selection
    pub selection: SelectorConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            action_threshold: DEFAULT_ACTION_THRESHOLD,
            base_interval: DEFAULT_BASE_INTERVAL,
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            history_cap: DEFAULT_HISTORY_CAP,
            sleep_slice: DEFAULT_SLEEP_SLICE,
            gather_backoff: DEFAULT_GATHER_BACKOFF,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            status_tail: DEFAULT_STATUS_TAIL,
            selection: SelectorConfig::default(),
        }
    }
}

impl LoopConfig {
    /// Set the weight table.
    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = weights;
        self
    }

    /// Set the action threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.action_threshold = threshold;
        self
    }

    /// Set base, min and max intervals.
    pub fn with_intervals(mut self, base: Duration, min: Duration, max: Duration) -> Self {
        self.base_interval = base;
        self.min_interval = min;
        self.max_interval = max;
        self
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    pub fn with_sleep_slice(mut self, slice: Duration) -> Self {
        self.sleep_slice = slice;
        self
    }

    pub fn with_gather_backoff(mut self, backoff: Duration) -> Self {
        self.gather_backoff = backoff;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_selection(mut self, selection: SelectorConfig) -> Self {
        self.selection = selection;
        self
    }

    /// Check the values the component constructors don't cover.
    pub fn validate(&self) -> Result<()> {
        if self.history_cap == 0 {
            return Err(AutoloopError::Configuration("history cap must be > 0".into()));
        }
        if self.sleep_slice.is_zero() {
            return Err(AutoloopError::Configuration("sleep slice must be > 0".into()));
        }
        if self.call_timeout.is_zero() {
            return Err(AutoloopError::Configuration("call timeout must be > 0".into()));
        }
        if self.stop_timeout.is_zero() {
            return Err(AutoloopError::Configuration("stop timeout must be > 0".into()));
        }
        Ok(())
    }
}

/// State the worker mutates and status readers copy.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: LoopState,
    pub(crate) history: HistoryRing,
}

/// Everything the worker task needs, shared with the handle.
pub(crate) struct Inner {
    pub(crate) config: LoopConfig,
    pub(crate) policy: DecisionPolicy,
    pub(crate) tuner: IntervalTuner,
    pub(crate) selector: ActionSelector,
    pub(crate) source: Arc<dyn SignalSource>,
    pub(crate) executor: Arc<dyn ActionExecutor>,
    pub(crate) store: Arc<dyn PersistenceStore>,
    pub(crate) started_at: DateTime<Utc>,
    shared: RwLock<Shared>,
}

impl Inner {
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Shared) -> T) -> T {
        let guard = self.shared.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut Shared) -> T) -> T {
        let mut guard = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// What one iteration produced
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub decision: Decision,
    /// Present when the decision acted
    pub action: Option<ActionResult>,
    /// Delay before the next iteration
    pub next_interval: Duration,
}

/// Autonomous decision loop.
///
/// Construction validates the whole configuration, so a `ControlLoop` that
/// exists can always be started.
pub struct ControlLoop {
    inner: Arc<Inner>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ControlLoop {
    /// Create a stopped loop.
    pub fn new(
        config: LoopConfig,
        source: Arc<dyn SignalSource>,
        executor: Arc<dyn ActionExecutor>,
        store: Arc<dyn PersistenceStore>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = DecisionPolicy::new(config.action_threshold)?;
        let tuner = IntervalTuner::new(config.base_interval, config.min_interval, config.max_interval)?;
        let selector = ActionSelector::new(config.selection.clone())?;
        let history = HistoryRing::new(config.history_cap);

        log::info!(
            "ControlLoop configured: threshold={} base={:?} min={:?} max={:?} history_cap={}",
            config.action_threshold,
            config.base_interval,
            config.min_interval,
            config.max_interval,
            config.history_cap
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                policy,
                tuner,
                selector,
                source,
                executor,
                store,
                started_at: Utc::now(),
                shared: RwLock::new(Shared {
                    state: LoopState::new(),
                    history,
                }),
            }),
            worker: Mutex::new(None),
        })
    }

    /// Launch the worker. Returns false if it is already running.
    pub async fn start(&self) -> bool {
        let mut slot = self.worker.lock().await;
        if slot.as_ref().is_some_and(|w| !w.join.is_finished()) {
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        self.inner.write(|s| s.state.running = true);
        let join = tokio::spawn(worker::run_worker(self.inner.clone(), rx));
        *slot = Some(WorkerHandle { shutdown, join });

        log::info!("ControlLoop started");
        true
    }

    /// Signal the worker and wait for it, at most `stop_timeout`.
    /// The loop is Stopped afterwards either way. Returns true if a worker was stopped.
    pub async fn stop(&self) -> bool {
        let mut slot = self.worker.lock().await;
        let stopped = match slot.take() {
            Some(handle) => {
                let _ = handle.shutdown.send(true);
                let mut join = handle.join;
                match tokio::time::timeout(self.inner.config.stop_timeout, &mut join).await {
                    Ok(Ok(())) => log::info!("ControlLoop stopped"),
                    Ok(Err(e)) => log::error!("ControlLoop worker ended abnormally: {}", e),
                    Err(_) => {
                        log::warn!(
                            "ControlLoop worker did not exit within {:?}, aborting",
                            self.inner.config.stop_timeout
                        );
                        join.abort();
                    }
                }
                true
            }
            None => false,
        };
        self.inner.write(|s| s.state.running = false);
        stopped
    }

    /// Whether the worker is running
    pub fn is_running(&self) -> bool {
        self.inner.read(|s| s.state.running)
    }

    /// Execute an action outside the normal cycle. `None` uses the fallback selector.
    ///
    /// Persists and counts exactly like an action the loop chose itself. If the
    /// loop stops while the action runs, nothing is recorded and `NotRunning`
    /// is returned.
    pub async fn force_action(&self, kind: Option<&str>) -> Result<ActionResult> {
        if !self.is_running() {
            return Err(AutoloopError::NotRunning);
        }
        let kind = match kind {
            Some(kind) => kind.to_string(),
            None => self.inner.selector.fallback(),
        };
        log::info!("Forcing action {}", kind);
        self.inner.act(&kind, None, true).await
    }

    /// Run one gather-score-act-record pass without sleeping.
    ///
    /// Only valid while stopped; the worker is the sole producer of decisions.
    pub async fn run_once(&self) -> Result<IterationOutcome> {
        let slot = self.worker.lock().await;
        if slot.as_ref().is_some_and(|w| !w.join.is_finished()) {
            return Err(AutoloopError::AlreadyRunning);
        }
        self.inner.run_once().await
    }

    /// Snapshot of counters and recent decisions
    pub fn status(&self) -> LoopStatusView {
        let tail = self.inner.config.status_tail;
        self.inner.read(|s| LoopStatusView::new(&s.state, s.history.tail(tail), s.history.len()))
    }

    /// Every decision still held in memory, oldest first
    pub fn history(&self) -> Vec<Decision> {
        self.inner.read(|s| s.history.to_vec())
    }

    /// Counters as of now
    pub fn state(&self) -> LoopState {
        self.inner.read(|s| s.state.clone())
    }

    /// Summary of everything the store has persisted
    pub async fn stats(&self) -> Result<LoopStatsSummary> {
        match tokio::time::timeout(self.inner.config.call_timeout, self.inner.store.stats()).await {
            Ok(result) => result,
            Err(_) => Err(AutoloopError::Timeout(format!(
                "stats after {:?}",
                self.inner.config.call_timeout
            ))),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }
}
