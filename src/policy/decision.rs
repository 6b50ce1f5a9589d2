//! Decision policy - weighted scoring of a signal vector.
//!
//! score = min(1, sum(weight[name] * clamp(value)))
//! acted = score > threshold
//!
//! The policy is pure: the same signals and weights always yield the same
//! score, verdict and reason.

use crate::domain::{Decision, Signal, clamp_unit};
use crate::error::{AutoloopError, Result};
use crate::policy::weights::WeightTable;

/// Default score above which the loop acts.
pub const DEFAULT_ACTION_THRESHOLD: f64 = 0.6;

/// Maps signals and weights to a bounded score and an act/wait verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    threshold: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ACTION_THRESHOLD,
        }
    }
}

impl DecisionPolicy {
    /// Create a policy. The threshold must lie strictly inside (0, 1).
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(AutoloopError::Configuration(format!(
                "action threshold must be in (0, 1), got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    /// The action threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a signal vector and produce a decision
    pub fn score(&self, signals: &[Signal], weights: &WeightTable) -> Decision {
        let clamped: Vec<Signal> = signals
            .iter()
            .map(|s| Signal {
                name: s.name.clone(),
                value: clamp_unit(s.value),
            })
            .collect();

        let contributions: Vec<(usize, f64)> = clamped
            .iter()
            .enumerate()
            .map(|(i, s)| (i, weights.weight(&s.name) * s.value))
            .collect();

        let raw: f64 = contributions.iter().map(|(_, c)| c).sum();
        let score = raw.clamp(0.0, 1.0);
        let acted = score > self.threshold;

        let top = top_contribution(&contributions);
        let dominant_signal = dominant(&contributions).map(|i| clamped[i].name.clone());

        let reason = match top {
            Some(i) if acted => format!("high {}: {:.2}", clamped[i].name, clamped[i].value),
            _ if acted => format!("score {:.2} above threshold {:.2}", score, self.threshold),
            _ => format!("score {:.2} vs threshold {:.2}", score, self.threshold),
        };

        Decision::new(clamped, score, acted, reason, dominant_signal)
    }
}

/// Index of the largest positive contribution; the first one wins ties.
fn top_contribution(contributions: &[(usize, f64)]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &(i, c) in contributions {
        if c <= 0.0 {
            continue;
        }
        match best {
            Some((_, b)) if c <= b => {}
            _ => best = Some((i, c)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the contribution strictly greater than every other one.
fn dominant(contributions: &[(usize, f64)]) -> Option<usize> {
    let top = top_contribution(contributions)?;
    let top_value = contributions[top].1;
    let tied = contributions
        .iter()
        .any(|&(i, c)| i != top && c >= top_value);
    if tied { None } else { Some(top) }
}
