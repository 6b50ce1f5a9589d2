//! Signal sources - produce the signal vector for one iteration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Signal, signal_names};
use crate::error::{AutoloopError, Result};
use crate::signals::health::HealthMonitor;

/// Loop facts a source may read. Gathering never mutates loop state.
#[derive(Debug, Clone, PartialEq)]
pub struct GatherContext {
    /// Current time
    pub now: DateTime<Utc>,
    /// When the loop was constructed
    pub started_at: DateTime<Utc>,
    /// When the last action finished, if any
    pub last_action_at: Option<DateTime<Utc>>,
}

impl GatherContext {
    /// Elapsed time since the last action, or since start when none has run
    pub fn since_last_action(&self) -> Duration {
        let since = self.last_action_at.unwrap_or(self.started_at);
        (self.now - since).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Supplies normalized observations
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Gather the current signal vector
    async fn gather(&self, ctx: &GatherContext) -> Result<Vec<Signal>>;
}

/// Configuration for the system signal source
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSourceConfig {
    /// Value substituted when the monitor cannot supply a metric
    pub neutral_default: f64,
    /// Elapsed time that maps to a time signal of 1.0
    pub time_ceiling: Duration,
    /// Upper bound on one monitor snapshot
    pub monitor_timeout: Duration,
    /// Seed for the exploration signal (None = OS entropy)
    pub exploration_seed: Option<u64>,
}

impl Default for SignalSourceConfig {
    fn default() -> Self {
        Self {
            neutral_default: 0.5,
            time_ceiling: Duration::from_secs(3600),
            monitor_timeout: Duration::from_secs(2),
            exploration_seed: None,
        }
    }
}

/// Gathers the five standard signals from the clock, a health monitor and a seeded RNG.
pub struct SystemSignalSource {
    monitor: Arc<dyn HealthMonitor>,
    config: SignalSourceConfig,
    rng: Mutex<StdRng>,
}

impl SystemSignalSource {
    /// Create a source over the given monitor
    pub fn new(monitor: Arc<dyn HealthMonitor>, config: SignalSourceConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.neutral_default) {
            return Err(AutoloopError::Configuration(format!(
                "neutral default must be in [0, 1], got {}",
                config.neutral_default
            )));
        }
        if config.time_ceiling.is_zero() {
            return Err(AutoloopError::Configuration("time ceiling must be > 0".into()));
        }
        let rng = match config.exploration_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            monitor,
            config,
            rng: Mutex::new(rng),
        })
    }

    /// Snapshot the monitor, falling back to an empty map when it is slow or unavailable
    async fn snapshot(&self) -> HashMap<String, f64> {
        match tokio::time::timeout(self.config.monitor_timeout, self.monitor.snapshot()).await {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => {
                log::debug!("Health monitor unavailable, using neutral defaults: {}", e);
                HashMap::new()
            }
            Err(_) => {
                log::warn!(
                    "Health monitor timed out after {:?}, using neutral defaults",
                    self.config.monitor_timeout
                );
                HashMap::new()
            }
        }
    }

    fn metric(&self, snapshot: &HashMap<String, f64>, name: &str) -> Result<Signal> {
        match snapshot.get(name) {
            Some(value) if !value.is_finite() => Err(AutoloopError::SignalGathering(format!(
                "{} is not a finite number: {}",
                name, value
            ))),
            Some(value) => Ok(Signal::new(name, *value)),
            None => Ok(Signal::new(name, self.config.neutral_default)),
        }
    }

    fn exploration(&self) -> Result<f64> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| AutoloopError::SignalGathering(e.to_string()))?;
        Ok(rng.random::<f64>())
    }
}

#[async_trait]
impl SignalSource for SystemSignalSource {
    async fn gather(&self, ctx: &GatherContext) -> Result<Vec<Signal>> {
        let elapsed = ctx.since_last_action().as_secs_f64();
        let time_value = elapsed / self.config.time_ceiling.as_secs_f64();

        let snapshot = self.snapshot().await;

        Ok(vec![
            Signal::new(signal_names::TIME_SINCE_LAST_ACTION, time_value),
            self.metric(&snapshot, signal_names::PERFORMANCE_FACTOR)?,
            self.metric(&snapshot, signal_names::COMPLEXITY_FACTOR)?,
            Signal::new(signal_names::EXPLORATION_FACTOR, self.exploration()?),
            self.metric(&snapshot, signal_names::ACTIVITY_FACTOR)?,
        ])
    }
}
