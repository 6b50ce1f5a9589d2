//! Weight table mapping signal names to non-negative weights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::signal_names;
use crate::error::{AutoloopError, Result};

/// Default weight for time since the last action.
pub const WEIGHT_TIME: f64 = 0.3;
/// Default weight for the performance signal.
pub const WEIGHT_PERFORMANCE: f64 = 0.25;
/// Default weight for the complexity signal.
pub const WEIGHT_COMPLEXITY: f64 = 0.2;
/// Default weight for the exploration signal.
pub const WEIGHT_EXPLORATION: f64 = 0.15;
/// Default weight for the activity signal.
pub const WEIGHT_ACTIVITY: f64 = 0.1;

/// Signal name to weight. Weights are finite and non-negative; they need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightTable {
    weights: BTreeMap<String, f64>,
}

impl WeightTable {
    /// Build a table, rejecting negative or non-finite weights
    pub fn new(weights: impl IntoIterator<Item = (String, f64)>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for (name, weight) in weights {
            if !weight.is_finite() {
                return Err(AutoloopError::Configuration(format!(
                    "weight for '{}' must be finite, got {}",
                    name, weight
                )));
            }
            if weight < 0.0 {
                return Err(AutoloopError::Configuration(format!(
                    "weight for '{}' must be non-negative, got {}",
                    name, weight
                )));
            }
            table.insert(name, weight);
        }
        Ok(Self { weights: table })
    }

    /// Weight for a signal name; unknown names weigh 0
    pub fn weight(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(0.0)
    }

    /// Iterate configured weights in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of configured weights
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no weights are configured
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        let weights = [
            (signal_names::TIME_SINCE_LAST_ACTION, WEIGHT_TIME),
            (signal_names::PERFORMANCE_FACTOR, WEIGHT_PERFORMANCE),
            (signal_names::COMPLEXITY_FACTOR, WEIGHT_COMPLEXITY),
            (signal_names::EXPLORATION_FACTOR, WEIGHT_EXPLORATION),
            (signal_names::ACTIVITY_FACTOR, WEIGHT_ACTIVITY),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();
        Self { weights }
    }
}

impl<'de> Deserialize<'de> for WeightTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
        WeightTable::new(raw).map_err(serde::de::Error::custom)
    }
}
