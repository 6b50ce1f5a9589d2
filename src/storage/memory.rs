//! In-memory store for tests and embedding callers.

use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::{LoopStatsSummary, MetricRecord, PersistenceStore, StatsAccumulator};
use crate::domain::{ActionRecord, Decision};
use crate::error::{AutoloopError, Result};

#[derive(Debug, Default)]
struct Records {
    decisions: Vec<Decision>,
    actions: Vec<ActionRecord>,
    metrics: Vec<MetricRecord>,
}

/// Store that keeps every record in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut Records) -> T) -> Result<T> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| AutoloopError::Persistence(e.to_string()))?;
        Ok(f(&mut records))
    }

    /// All persisted decisions
    pub fn decisions(&self) -> Vec<Decision> {
        self.with_records(|r| r.decisions.clone()).unwrap_or_default()
    }

    /// All persisted actions
    pub fn actions(&self) -> Vec<ActionRecord> {
        self.with_records(|r| r.actions.clone()).unwrap_or_default()
    }

    /// All persisted metrics
    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.with_records(|r| r.metrics.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn append_decision(&self, decision: &Decision) -> Result<()> {
        self.with_records(|r| r.decisions.push(decision.clone()))
    }

    async fn append_action(&self, record: &ActionRecord) -> Result<()> {
        self.with_records(|r| r.actions.push(record.clone()))
    }

    async fn append_metric(&self, name: &str, value: f64, context: &str) -> Result<()> {
        self.with_records(|r| r.metrics.push(MetricRecord::new(name, value, context)))
    }

    async fn stats(&self) -> Result<LoopStatsSummary> {
        self.with_records(|r| {
            let mut acc = StatsAccumulator::default();
            r.decisions.iter().for_each(|d| acc.observe_decision(d));
            r.actions.iter().for_each(|a| acc.observe_action(a));
            acc.finish()
        })
    }
}
