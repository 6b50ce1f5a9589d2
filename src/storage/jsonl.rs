//! JSONL-based append-only store.
//!
//! One file per collection under a base directory:
//! `decisions.jsonl`, `actions.jsonl`, `metrics.jsonl`. Lines are never
//! rewritten. File IO runs on the blocking pool so a slow disk cannot stall
//! the async worker beyond its call timeout.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::traits::{LoopStatsSummary, MetricRecord, PersistenceStore, StatsAccumulator};
use crate::domain::{ActionRecord, Decision};
use crate::error::{AutoloopError, Result};

const DECISIONS: &str = "decisions";
const ACTIONS: &str = "actions";
const METRICS: &str = "metrics";

/// Append-only JSONL store
#[derive(Debug, Clone)]
pub struct JsonlStore {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlStore {
    /// Create a new JsonlStore at the given path.
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Directory holding the collection files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a collection.
    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    /// Append one record on the blocking pool.
    async fn append<T: Serialize>(&self, collection: &str, record: &T) -> Result<()> {
        let line = serde_json::to_string(record).map_err(|e| AutoloopError::from(e).into_persistence())?;
        let path = self.collection_path(collection);
        let lock = self.write_lock.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let _guard = lock.lock().map_err(|e| AutoloopError::Persistence(e.to_string()))?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{}", line)?;
            Ok(())
        })
        .await
        .map_err(|e| AutoloopError::Persistence(e.to_string()))?
        .map_err(AutoloopError::into_persistence)
    }

    /// Read every record of a collection (blocking).
    fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(&line)?);
            }
        }
        Ok(records)
    }

    /// All persisted decisions
    pub async fn decisions(&self) -> Result<Vec<Decision>> {
        self.load(DECISIONS).await
    }

    /// All persisted actions
    pub async fn actions(&self) -> Result<Vec<ActionRecord>> {
        self.load(ACTIONS).await
    }

    /// All persisted metrics
    pub async fn metrics(&self) -> Result<Vec<MetricRecord>> {
        self.load(METRICS).await
    }

    async fn load<T: DeserializeOwned + Send + 'static>(&self, collection: &str) -> Result<Vec<T>> {
        let path = self.collection_path(collection);
        tokio::task::spawn_blocking(move || Self::read_all(&path))
            .await
            .map_err(|e| AutoloopError::Persistence(e.to_string()))?
            .map_err(AutoloopError::into_persistence)
    }
}

#[async_trait]
impl PersistenceStore for JsonlStore {
    async fn append_decision(&self, decision: &Decision) -> Result<()> {
        self.append(DECISIONS, decision).await
    }

    async fn append_action(&self, record: &ActionRecord) -> Result<()> {
        self.append(ACTIONS, record).await
    }

    async fn append_metric(&self, name: &str, value: f64, context: &str) -> Result<()> {
        self.append(METRICS, &MetricRecord::new(name, value, context)).await
    }

    async fn stats(&self) -> Result<LoopStatsSummary> {
        let decisions: Vec<Decision> = self.decisions().await?;
        let actions: Vec<ActionRecord> = self.actions().await?;

        let mut acc = StatsAccumulator::default();
        decisions.iter().for_each(|d| acc.observe_decision(d));
        actions.iter().for_each(|a| acc.observe_action(a));
        Ok(acc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionResult, Signal};
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonlStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_append_decision_creates_file() {
        let (store, temp) = create_test_store();
        let decision = Decision::new(vec![Signal::new("performance_factor", 0.3)], 0.1, false, "idle", None);
        store.append_decision(&decision).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join("decisions.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains(&decision.id));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let decision = Decision::new(Vec::new(), 0.9, true, "high x: 0.90", None);
        {
            let store = JsonlStore::new(temp_dir.path()).unwrap();
            store.append_decision(&decision).await.unwrap();
        }
        let store = JsonlStore::new(temp_dir.path()).unwrap();
        let loaded = store.decisions().await.unwrap();
        assert_eq!(loaded, vec![decision]);
    }

    #[tokio::test]
    async fn test_append_is_ordered() {
        let (store, _temp) = create_test_store();
        for i in 0..5 {
            store.append_metric("next_interval_secs", i as f64, "").await.unwrap();
        }
        let values: Vec<f64> = store.metrics().await.unwrap().iter().map(|m| m.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let (store, _temp) = create_test_store();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats, LoopStatsSummary::default());
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let (store, _temp) = create_test_store();
        store
            .append_decision(&Decision::new(Vec::new(), 0.8, true, "a", None))
            .await
            .unwrap();
        store
            .append_decision(&Decision::new(Vec::new(), 0.2, false, "b", None))
            .await
            .unwrap();
        let ok = ActionResult::succeeded("exploration", 1.0, Duration::from_millis(2));
        store
            .append_action(&ActionRecord::from_result(&ok, None, false))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_decisions, 2);
        assert_eq!(stats.acted_decisions, 1);
        assert_eq!(stats.total_actions, 1);
        assert_eq!(stats.successful_actions, 1);
        assert!((stats.average_score - 0.5).abs() < 1e-12);
        assert_eq!(stats.average_impact, 1.0);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_persistence_error() {
        let (store, temp) = create_test_store();
        std::fs::write(temp.path().join("decisions.jsonl"), "{not json}\n").unwrap();
        let err = store.stats().await.unwrap_err();
        assert!(matches!(err, AutoloopError::Persistence(_)));
    }
}
