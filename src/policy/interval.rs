//! Interval tuner - adaptive poll delay.
//!
//! interval = clamp(base * (1 - last_score) * (0.5 + 0.5 * success_rate), min, max)
//!
//! A low score lengthens the wait, and so does a poor action success rate.

use std::time::Duration;

use crate::domain::clamp_unit;
use crate::error::{AutoloopError, Result};

/// Default base interval.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(60);
/// Default lower bound.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(30);
/// Default upper bound.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(600);

/// Compute the next poll delay. Output is always within [min, max] when min <= max.
pub fn next_interval(last_score: f64, success_rate: f64, base: Duration, min: Duration, max: Duration) -> Duration {
    let score_factor = 1.0 - clamp_unit(last_score);
    let success_factor = 0.5 + 0.5 * clamp_unit(success_rate);
    let raw_secs = base.as_secs_f64() * score_factor * success_factor;
    let raw = if raw_secs.is_finite() && raw_secs >= 0.0 {
        Duration::try_from_secs_f64(raw_secs).unwrap_or(max)
    } else {
        max
    };
    raw.max(min).min(max)
}

/// Holds the validated base/min/max triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTuner {
    base: Duration,
    min: Duration,
    max: Duration,
}

impl Default for IntervalTuner {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_INTERVAL,
            min: DEFAULT_MIN_INTERVAL,
            max: DEFAULT_MAX_INTERVAL,
        }
    }
}

impl IntervalTuner {
    /// Create a tuner. Requires min <= base <= max and a non-zero base.
    pub fn new(base: Duration, min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(AutoloopError::Configuration(format!(
                "min interval ({:?}) must not exceed max interval ({:?})",
                min, max
            )));
        }
        if base.is_zero() {
            return Err(AutoloopError::Configuration("base interval must be > 0".into()));
        }
        if base < min || base > max {
            return Err(AutoloopError::Configuration(format!(
                "base interval ({:?}) must lie within [{:?}, {:?}]",
                base, min, max
            )));
        }
        Ok(Self { base, min, max })
    }

    /// Next delay for the given score and success rate
    pub fn next_interval(&self, last_score: f64, success_rate: f64) -> Duration {
        next_interval(last_score, success_rate, self.base, self.min, self.max)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}
