//! Signal types - normalized observations fed into scoring
//!
//! Every signal value lives in [0, 1]. Values are clamped on construction and
//! again by the policy before use.

use serde::{Deserialize, Serialize};

/// Well-known signal names
pub mod signal_names {
    pub const TIME_SINCE_LAST_ACTION: &str = "time_since_last_action";
    pub const PERFORMANCE_FACTOR: &str = "performance_factor";
    pub const COMPLEXITY_FACTOR: &str = "complexity_factor";
    pub const EXPLORATION_FACTOR: &str = "exploration_factor";
    pub const ACTIVITY_FACTOR: &str = "activity_factor";

    /// The signal set gathered by the system source, in gather order
    pub const REQUIRED: [&str; 5] = [
        TIME_SINCE_LAST_ACTION,
        PERFORMANCE_FACTOR,
        COMPLEXITY_FACTOR,
        EXPLORATION_FACTOR,
        ACTIVITY_FACTOR,
    ];
}

/// Clamp a raw observation into [0, 1]. NaN maps to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// A single named observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Signal name (see `signal_names`)
    pub name: String,
    /// Observed value in [0, 1]
    pub value: f64,
}

impl Signal {
    /// Create a signal, clamping the value into [0, 1]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: clamp_unit(value),
        }
    }
}
