//! Worker - the gather -> score -> act -> record -> sleep cycle.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::daemon::control::{Inner, IterationOutcome};
use crate::domain::{ActionRecord, ActionResult};
use crate::error::{AutoloopError, Result};
use crate::executor::execute_isolated;
use crate::signals::GatherContext;

/// Metric: score of each decision
pub const METRIC_DECISION_SCORE: &str = "decision_score";
/// Metric: delay chosen after each decision
pub const METRIC_NEXT_INTERVAL: &str = "next_interval_secs";
/// Metric: impact reported by each action
pub const METRIC_ACTION_IMPACT: &str = "action_impact";

/// Sleep for `total` in steps of at most `slice`, returning early on shutdown.
///
/// Returns true when the full duration elapsed, false when cancelled.
pub async fn sleep_cancellable(total: Duration, slice: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let deadline = Instant::now() + total;
    let slice = if slice.is_zero() { total } else { slice };
    loop {
        if *shutdown.borrow() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let step = slice.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(step) => {}
            changed = shutdown.changed() => {
                // Sender dropped means the handle is gone
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

/// Worker task body. Runs until shutdown is signalled or the handle is dropped.
pub(crate) async fn run_worker(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("Control loop worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let delay = match AssertUnwindSafe(inner.run_once()).catch_unwind().await {
            Ok(Ok(outcome)) => outcome.next_interval,
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    backoff_secs = inner.config.gather_backoff.as_secs(),
                    "Iteration skipped"
                );
                inner.config.gather_backoff
            }
            Err(_) => {
                tracing::error!("Iteration panicked, backing off");
                inner.config.gather_backoff
            }
        };

        if !sleep_cancellable(delay, inner.config.sleep_slice, &mut shutdown).await {
            break;
        }
    }
    tracing::info!("Control loop worker exiting");
}

impl Inner {
    /// One full iteration without the trailing sleep.
    pub(crate) async fn run_once(&self) -> Result<IterationOutcome> {
        let ctx = GatherContext {
            now: Utc::now(),
            started_at: self.started_at,
            last_action_at: self.read(|s| s.state.last_action_at),
        };

        // Leaves room for the source's own monitor timeout
        let gather_timeout = self.config.call_timeout * 2;
        let gathered = match tokio::time::timeout(gather_timeout, self.source.gather(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(AutoloopError::SignalGathering(format!(
                "gather timed out after {:?}",
                gather_timeout
            ))),
        };
        let signals = match gathered {
            Ok(signals) => signals,
            Err(e) => {
                self.write(|s| s.state.gather_failures += 1);
                let e = match e {
                    AutoloopError::SignalGathering(_) => e,
                    other => AutoloopError::SignalGathering(other.to_string()),
                };
                return Err(e);
            }
        };

        let decision = self.policy.score(&signals, &self.config.weights);
        self.write(|s| {
            s.history.push(decision.clone());
            s.state.record_decision();
        });
        tracing::info!(
            decision_id = %decision.id,
            score = decision.score,
            acted = decision.acted,
            reason = %decision.reason,
            "Decision recorded"
        );

        self.persist("append_decision", self.store.append_decision(&decision))
            .await;
        self.persist(
            "append_metric",
            self.store
                .append_metric(METRIC_DECISION_SCORE, decision.score, &decision.reason),
        )
        .await;

        let action = if decision.acted {
            let kind = self.selector.choose(&decision);
            Some(self.act(&kind, Some(decision.id.clone()), false).await?)
        } else {
            None
        };

        let success_rate = self.read(|s| s.state.success_rate());
        let next_interval = self.tuner.next_interval(decision.score, success_rate);
        self.write(|s| s.state.last_interval = Some(next_interval));
        tracing::debug!(
            next_interval_secs = next_interval.as_secs_f64(),
            success_rate = success_rate,
            "Next interval computed"
        );
        self.persist(
            "append_metric",
            self.store
                .append_metric(METRIC_NEXT_INTERVAL, next_interval.as_secs_f64(), ""),
        )
        .await;

        Ok(IterationOutcome {
            decision,
            action,
            next_interval,
        })
    }

    /// Execute, count and persist one action.
    ///
    /// A forced action is recorded only if the loop is still running when it
    /// finishes; the running check and the counter update share one lock.
    pub(crate) async fn act(&self, kind: &str, decision_id: Option<String>, forced: bool) -> Result<ActionResult> {
        let result = execute_isolated(self.executor.as_ref(), kind).await;
        let finished = Utc::now();
        let recorded = self.write(|s| {
            if forced && !s.state.running {
                return false;
            }
            s.state.record_action(&result, finished);
            true
        });
        if !recorded {
            tracing::warn!(kind = %result.kind, "Loop stopped during forced action, result discarded");
            return Err(AutoloopError::NotRunning);
        }

        if result.success {
            tracing::info!(
                kind = %result.kind,
                impact = result.impact,
                duration_ms = result.duration.as_millis() as u64,
                forced = forced,
                "Action succeeded"
            );
        } else {
            tracing::warn!(
                kind = %result.kind,
                error = result.error.as_deref().unwrap_or(""),
                forced = forced,
                "Action failed"
            );
        }

        let record = ActionRecord::from_result(&result, decision_id, forced);
        self.persist("append_action", self.store.append_action(&record)).await;
        self.persist(
            "append_metric",
            self.store
                .append_metric(METRIC_ACTION_IMPACT, result.impact, &result.kind),
        )
        .await;

        Ok(result)
    }

    /// Await a store call under the call timeout. Failures are counted and logged, never returned.
    async fn persist(&self, what: &str, call: impl Future<Output = Result<()>>) {
        let outcome = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AutoloopError::Timeout(format!(
                "{} after {:?}",
                what, self.config.call_timeout
            ))),
        };
        if let Err(e) = outcome {
            let e = e.into_persistence();
            self.write(|s| s.state.persistence_failures += 1);
            tracing::warn!(operation = what, error = %e, "Persistence failed");
        }
    }
}
