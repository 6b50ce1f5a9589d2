//! Decision record - the result of one scoring pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::signal::Signal;
use crate::id::generate_decision_id;

/// One scoring pass. Created once per loop iteration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision identifier
    pub id: String,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Signals the score was computed from (clamped)
    pub signals: Vec<Signal>,
    /// Weighted score in [0, 1]
    pub score: f64,
    /// Whether the score crossed the action threshold
    pub acted: bool,
    /// Human-readable explanation
    pub reason: String,
    /// Signal whose contribution strictly exceeded every other, if any
    #[serde(default)]
    pub dominant_signal: Option<String>,
}

impl Decision {
    /// Create a decision stamped with the current time
    pub fn new(
        signals: Vec<Signal>,
        score: f64,
        acted: bool,
        reason: impl Into<String>,
        dominant_signal: Option<String>,
    ) -> Self {
        Self {
            id: generate_decision_id(),
            timestamp: Utc::now(),
            signals,
            score,
            acted,
            reason: reason.into(),
            dominant_signal,
        }
    }

    /// Look up a signal value by name
    pub fn signal(&self, name: &str) -> Option<f64> {
        self.signals.iter().find(|s| s.name == name).map(|s| s.value)
    }
}
