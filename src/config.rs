//! YAML configuration and wiring.
//!
//! Every section defaults, so an empty file (or no file) is a valid config.
//! `Config::validate()` turns the file form into the runtime `LoopConfig`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::daemon::{
    ControlLoop, DEFAULT_CALL_TIMEOUT, DEFAULT_GATHER_BACKOFF, DEFAULT_SLEEP_SLICE, DEFAULT_STATUS_TAIL,
    DEFAULT_STOP_TIMEOUT, LoopConfig,
};
use crate::error::{AutoloopError, Result};
use crate::executor::{ActionRegistry, ActionSelector, CommandAction, CommandActionConfig, SelectorConfig};
use crate::history::DEFAULT_HISTORY_CAP;
use crate::policy::{
    DEFAULT_ACTION_THRESHOLD, DEFAULT_BASE_INTERVAL, DEFAULT_MAX_INTERVAL, DEFAULT_MIN_INTERVAL, DecisionPolicy,
    IntervalTuner, WeightTable,
};
use crate::signals::{
    FileHealthMonitor, HealthMonitor, SignalSource, SignalSourceConfig, SystemSignalSource, UnavailableHealthMonitor,
};
use crate::storage::{PersistenceStore, StorageBackend, open_store};

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub control: ControlConfig,
    pub signals: SignalsConfig,
    pub selection: SelectorConfig,
    pub health: HealthConfig,
    pub storage: StorageConfig,
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub weights: WeightTable,
    pub action_threshold: f64,
    pub base_interval_secs: u64,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    pub history_cap: usize,
    pub sleep_slice_ms: u64,
    pub gather_backoff_secs: u64,
    pub call_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub status_tail: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            action_threshold: DEFAULT_ACTION_THRESHOLD,
            base_interval_secs: DEFAULT_BASE_INTERVAL.as_secs(),
            min_interval_secs: DEFAULT_MIN_INTERVAL.as_secs(),
            max_interval_secs: DEFAULT_MAX_INTERVAL.as_secs(),
            history_cap: DEFAULT_HISTORY_CAP,
            sleep_slice_ms: DEFAULT_SLEEP_SLICE.as_millis() as u64,
            gather_backoff_secs: DEFAULT_GATHER_BACKOFF.as_secs(),
            call_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT.as_millis() as u64,
            status_tail: DEFAULT_STATUS_TAIL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    pub exploration_seed: Option<u64>,
    pub neutral_default: f64,
    pub time_ceiling_secs: u64,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            exploration_seed: None,
            neutral_default: 0.5,
            time_ceiling_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// JSON file of metric name -> value, re-read every snapshot
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(PROJECT_NAME),
        }
    }
}

/// A shell command registered as an action kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub kind: String,
    pub command: String,
    #[serde(default = "default_action_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_action_impact")]
    pub impact: f64,
}

fn default_action_timeout_ms() -> u64 {
    30000
}

fn default_action_impact() -> f64 {
    0.5
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try ./<project>.yml
        let local_config = PathBuf::from(format!("{}.yml", PROJECT_NAME));
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(PROJECT_NAME).join(format!("{}.yml", PROJECT_NAME));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AutoloopError::Configuration(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&content)
            .map_err(|e| AutoloopError::Configuration(format!("failed to parse {}: {}", path.display(), e)))?;

        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Runtime loop configuration. Fails on any value the loop would reject.
    pub fn validate(&self) -> Result<LoopConfig> {
        let c = &self.control;
        let config = LoopConfig {
            weights: c.weights.clone(),
            action_threshold: c.action_threshold,
            base_interval: Duration::from_secs(c.base_interval_secs),
            min_interval: Duration::from_secs(c.min_interval_secs),
            max_interval: Duration::from_secs(c.max_interval_secs),
            history_cap: c.history_cap,
            sleep_slice: Duration::from_millis(c.sleep_slice_ms),
            gather_backoff: Duration::from_secs(c.gather_backoff_secs),
            call_timeout: Duration::from_millis(c.call_timeout_ms),
            stop_timeout: Duration::from_millis(c.stop_timeout_ms),
            status_tail: c.status_tail,
            selection: self.selection.clone(),
        };

        config.validate()?;
        DecisionPolicy::new(config.action_threshold)?;
        IntervalTuner::new(config.base_interval, config.min_interval, config.max_interval)?;
        ActionSelector::new(config.selection.clone())?;
        SystemSignalSource::new(Arc::new(UnavailableHealthMonitor), self.signal_source_config())?;
        for action in &self.actions {
            if action.kind.trim().is_empty() {
                return Err(AutoloopError::Configuration("action kind must not be empty".into()));
            }
            if action.command.trim().is_empty() {
                return Err(AutoloopError::Configuration(format!(
                    "action '{}' has an empty command",
                    action.kind
                )));
            }
            if !action.impact.is_finite() || action.impact < 0.0 {
                return Err(AutoloopError::Configuration(format!(
                    "action '{}' impact must be a non-negative number",
                    action.kind
                )));
            }
        }
        Ok(config)
    }

    /// Signal source settings
    pub fn signal_source_config(&self) -> SignalSourceConfig {
        SignalSourceConfig {
            neutral_default: self.signals.neutral_default,
            time_ceiling: Duration::from_secs(self.signals.time_ceiling_secs),
            monitor_timeout: Duration::from_millis(self.control.call_timeout_ms),
            exploration_seed: self.signals.exploration_seed,
        }
    }

    /// Configured health monitor, or one that is always unavailable
    pub fn health_monitor(&self) -> Arc<dyn HealthMonitor> {
        match &self.health.snapshot_path {
            Some(path) => Arc::new(FileHealthMonitor::new(path)),
            None => Arc::new(UnavailableHealthMonitor),
        }
    }

    /// Registry of configured command actions
    pub fn action_registry(&self) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for action in &self.actions {
            let config = CommandActionConfig::new(&action.command)
                .timeout_ms(action.timeout_ms)
                .impact(action.impact);
            registry.register(Arc::new(CommandAction::new(&action.kind, config)));
        }
        registry
    }

    /// Kinds the loop can select that no configured action handles
    pub fn unregistered_kinds(&self) -> Vec<String> {
        let registered: HashSet<&str> = self.actions.iter().map(|a| a.kind.as_str()).collect();
        let mut kinds: Vec<String> = self
            .selection
            .action_set
            .iter()
            .chain(self.selection.mapping.values())
            .filter(|kind| !registered.contains(kind.as_str()))
            .cloned()
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Open the configured store
    pub fn open_store(&self) -> Result<Arc<dyn PersistenceStore>> {
        open_store(self.storage.backend, &self.storage.dir)
    }

    /// Validate and assemble a stopped control loop
    ///
    /// The memory backend is rejected: it grows for the life of the process
    /// and loses everything on exit.
    pub fn build_loop(&self) -> Result<ControlLoop> {
        let loop_config = self.validate()?;
        if self.storage.backend == StorageBackend::Memory {
            return Err(AutoloopError::Configuration(
                "storage backend 'memory' is for tests and embedding only; use jsonl or sqlite".into(),
            ));
        }
        for kind in self.unregistered_kinds() {
            log::warn!("No action configured for kind '{}'; it will always fail", kind);
        }
        let source: Arc<dyn SignalSource> = Arc::new(SystemSignalSource::new(
            self.health_monitor(),
            self.signal_source_config(),
        )?);
        ControlLoop::new(
            loop_config,
            source,
            Arc::new(self.action_registry()),
            self.open_store()?,
        )
    }
}
