//! Health monitors - external snapshots of system condition.
//!
//! A monitor returns a map of metric name to value. The signal source reads
//! the `*_factor` keys it knows and substitutes a neutral default for the rest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AutoloopError, Result};

/// Source of health metrics
#[async_trait]
pub trait HealthMonitor: Send + Sync {
    /// Take a snapshot of current metrics
    async fn snapshot(&self) -> Result<HashMap<String, f64>>;
}

/// Monitor that always returns the same values
#[derive(Debug, Clone, Default)]
pub struct StaticHealthMonitor {
    values: HashMap<String, f64>,
}

impl StaticHealthMonitor {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }

    /// Set one metric
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl HealthMonitor for StaticHealthMonitor {
    async fn snapshot(&self) -> Result<HashMap<String, f64>> {
        Ok(self.values.clone())
    }
}

/// Monitor that reads a JSON object of metrics from a file on every snapshot
#[derive(Debug, Clone)]
pub struct FileHealthMonitor {
    path: PathBuf,
}

impl FileHealthMonitor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HealthMonitor for FileHealthMonitor {
    async fn snapshot(&self) -> Result<HashMap<String, f64>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let values: HashMap<String, f64> = serde_json::from_str(&content)?;
        Ok(values)
    }
}

/// Monitor used when none is configured; every snapshot fails
#[derive(Debug, Clone, Default)]
pub struct UnavailableHealthMonitor;

#[async_trait]
impl HealthMonitor for UnavailableHealthMonitor {
    async fn snapshot(&self) -> Result<HashMap<String, f64>> {
        Err(AutoloopError::SignalGathering("no health monitor configured".into()))
    }
}
