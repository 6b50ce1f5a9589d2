//! Action selection - which action kind a decision should run.
//!
//! The dominant signal's mapped kind wins. With no dominant signal (a tie) or
//! an unmapped one, a deterministic fallback picks from the action set.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::{Decision, signal_names};
use crate::error::{AutoloopError, Result};

/// Action kinds, one per standard signal
pub mod action_kinds {
    pub const ROUTINE_MAINTENANCE: &str = "routine_maintenance";
    pub const PERFORMANCE_OPTIMIZATION: &str = "performance_optimization";
    pub const COMPLEXITY_REDUCTION: &str = "complexity_reduction";
    pub const EXPLORATION: &str = "exploration";
    pub const ACTIVITY_RESPONSE: &str = "activity_response";
}

/// Default signal → action kind mapping
pub fn default_mapping() -> HashMap<String, String> {
    [
        (signal_names::TIME_SINCE_LAST_ACTION, action_kinds::ROUTINE_MAINTENANCE),
        (signal_names::PERFORMANCE_FACTOR, action_kinds::PERFORMANCE_OPTIMIZATION),
        (signal_names::COMPLEXITY_FACTOR, action_kinds::COMPLEXITY_REDUCTION),
        (signal_names::EXPLORATION_FACTOR, action_kinds::EXPLORATION),
        (signal_names::ACTIVITY_FACTOR, action_kinds::ACTIVITY_RESPONSE),
    ]
    .into_iter()
    .map(|(s, k)| (s.to_string(), k.to_string()))
    .collect()
}

/// How to pick an action when no signal dominates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Cycle through the action set in order
    #[default]
    RoundRobin,
    /// Uniform pick from a seeded RNG
    SeededRandom,
}

/// Selector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Signal name → action kind
    pub mapping: HashMap<String, String>,
    /// Kinds the fallback chooses from
    pub action_set: Vec<String>,
    /// Fallback strategy
    pub fallback: FallbackStrategy,
    /// Seed for `SeededRandom`
    pub seed: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            mapping: default_mapping(),
            action_set: vec![
                action_kinds::ROUTINE_MAINTENANCE.to_string(),
                action_kinds::PERFORMANCE_OPTIMIZATION.to_string(),
                action_kinds::COMPLEXITY_REDUCTION.to_string(),
                action_kinds::EXPLORATION.to_string(),
                action_kinds::ACTIVITY_RESPONSE.to_string(),
            ],
            fallback: FallbackStrategy::RoundRobin,
            seed: 0,
        }
    }
}

/// Chooses an action kind for a decision
#[derive(Debug)]
pub struct ActionSelector {
    mapping: HashMap<String, String>,
    action_set: Vec<String>,
    fallback: FallbackStrategy,
    cursor: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl ActionSelector {
    /// Create a selector. The action set must not be empty.
    pub fn new(config: SelectorConfig) -> Result<Self> {
        if config.action_set.is_empty() {
            return Err(AutoloopError::Configuration("action set must not be empty".into()));
        }
        if let Some(kind) = config.action_set.iter().find(|k| k.trim().is_empty()) {
            return Err(AutoloopError::Configuration(format!("invalid action kind '{}'", kind)));
        }
        Ok(Self {
            mapping: config.mapping,
            action_set: config.action_set,
            fallback: config.fallback,
            cursor: AtomicUsize::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
        })
    }

    /// Kind for a decision: mapped dominant signal, else fallback
    pub fn choose(&self, decision: &Decision) -> String {
        decision
            .dominant_signal
            .as_ref()
            .and_then(|signal| self.mapping.get(signal))
            .cloned()
            .unwrap_or_else(|| self.fallback())
    }

    /// Deterministic fallback pick from the action set
    pub fn fallback(&self) -> String {
        let index = match self.fallback {
            FallbackStrategy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % self.action_set.len(),
            FallbackStrategy::SeededRandom => match self.rng.lock() {
                Ok(mut rng) => rng.random_range(0..self.action_set.len()),
                Err(poisoned) => poisoned.into_inner().random_range(0..self.action_set.len()),
            },
        };
        self.action_set[index].clone()
    }

    /// The configured action set
    pub fn action_set(&self) -> &[String] {
        &self.action_set
    }
}
