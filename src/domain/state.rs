//! Loop state - counters owned by the control loop.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::action::ActionResult;

/// Process-lifetime counters for one control loop.
///
/// Only reachable through the loop's lock; callers see copies via status snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    /// Whether the worker is running
    pub running: bool,
    /// Decisions recorded since construction
    pub total_decisions: u64,
    /// Actions executed since construction
    pub total_actions: u64,
    /// Actions that reported success
    pub successful_actions: u64,
    /// When the most recent action finished
    pub last_action_at: Option<DateTime<Utc>>,
    /// Delay chosen after the most recent decision
    pub last_interval: Option<Duration>,
    /// Gather attempts that failed
    pub gather_failures: u64,
    /// Store calls that failed or timed out
    pub persistence_failures: u64,
}

impl LoopState {
    /// Create a new, stopped state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision
    pub fn record_decision(&mut self) {
        self.total_decisions += 1;
    }

    /// Record an executed action
    pub fn record_action(&mut self, result: &ActionResult, at: DateTime<Utc>) {
        self.total_actions += 1;
        if result.success {
            self.successful_actions += 1;
        }
        self.last_action_at = Some(at);
    }

    /// Fraction of actions that succeeded. 1.0 before any action has run.
    pub fn success_rate(&self) -> f64 {
        if self.total_actions == 0 {
            1.0
        } else {
            self.successful_actions as f64 / self.total_actions as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_new() {
        let state = LoopState::new();
        assert!(!state.running);
        assert_eq!(state.total_decisions, 0);
        assert!(state.last_action_at.is_none());
    }

    #[test]
    fn test_success_rate_without_actions() {
        assert_eq!(LoopState::new().success_rate(), 1.0);
    }

    #[test]
    fn test_record_action_counts() {
        let mut state = LoopState::new();
        for i in 0..10 {
            let result = if i < 8 {
                ActionResult::succeeded("exploration", 0.1, Duration::ZERO)
            } else {
                ActionResult::failed("exploration", "nope", Duration::ZERO)
            };
            state.record_action(&result, Utc::now());
        }
        assert_eq!(state.total_actions, 10);
        assert_eq!(state.successful_actions, 8);
        assert!((state.success_rate() - 0.8).abs() < 1e-12);
        assert!(state.last_action_at.is_some());
    }

    #[test]
    fn test_record_decision() {
        let mut state = LoopState::new();
        state.record_decision();
        state.record_decision();
        assert_eq!(state.total_decisions, 2);
    }
}
