//! Persistence trait and shared record types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ActionRecord, Decision};
use crate::error::Result;

/// One named metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name (e.g. "decision_score")
    pub name: String,
    /// Sample value
    pub value: f64,
    /// Free-form context (reason, action kind)
    pub context: String,
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, value: f64, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            context: context.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate view over everything a store has persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopStatsSummary {
    pub total_decisions: u64,
    pub acted_decisions: u64,
    pub total_actions: u64,
    pub successful_actions: u64,
    /// Mean decision score (0 when empty)
    pub average_score: f64,
    /// Mean action impact (0 when empty)
    pub average_impact: f64,
    pub last_action_at: Option<DateTime<Utc>>,
}

impl LoopStatsSummary {
    /// Fraction of persisted actions that succeeded (None when no actions)
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_actions == 0 {
            None
        } else {
            Some(self.successful_actions as f64 / self.total_actions as f64)
        }
    }
}

/// Streaming builder for `LoopStatsSummary`
#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    summary: LoopStatsSummary,
    score_sum: f64,
    impact_sum: f64,
}

impl StatsAccumulator {
    pub(crate) fn observe_decision(&mut self, decision: &Decision) {
        self.summary.total_decisions += 1;
        if decision.acted {
            self.summary.acted_decisions += 1;
        }
        self.score_sum += decision.score;
    }

    pub(crate) fn observe_action(&mut self, action: &ActionRecord) {
        self.summary.total_actions += 1;
        if action.success {
            self.summary.successful_actions += 1;
        }
        self.impact_sum += action.impact;
        if self.summary.last_action_at.is_none_or(|t| action.timestamp > t) {
            self.summary.last_action_at = Some(action.timestamp);
        }
    }

    pub(crate) fn finish(mut self) -> LoopStatsSummary {
        if self.summary.total_decisions > 0 {
            self.summary.average_score = self.score_sum / self.summary.total_decisions as f64;
        }
        if self.summary.total_actions > 0 {
            self.summary.average_impact = self.impact_sum / self.summary.total_actions as f64;
        }
        self.summary
    }
}

/// Durable append-only log consumed by the control loop.
///
/// The loop depends only on these operations succeeding or failing, never on
/// how an implementation stores the data.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Append a decision
    async fn append_decision(&self, decision: &Decision) -> Result<()>;

    /// Append an action record
    async fn append_action(&self, record: &ActionRecord) -> Result<()>;

    /// Append a metric sample
    async fn append_metric(&self, name: &str, value: f64, context: &str) -> Result<()>;

    /// Summarize everything persisted so far
    async fn stats(&self) -> Result<LoopStatsSummary>;
}
