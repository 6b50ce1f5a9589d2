//! Status view - a copy of loop counters and recent decisions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Decision, LoopState};

/// Point-in-time snapshot returned by `ControlLoop::status()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatusView {
    pub running: bool,
    pub total_decisions: u64,
    pub total_actions: u64,
    pub successful_actions: u64,
    /// successful / total, 1.0 before the first action
    pub success_rate: f64,
    pub last_action_at: Option<DateTime<Utc>>,
    /// Delay chosen after the latest decision
    pub last_interval: Option<Duration>,
    pub gather_failures: u64,
    pub persistence_failures: u64,
    /// Most recent decisions, oldest first
    pub recent_decisions: Vec<Decision>,
    /// Decisions currently held in memory
    pub history_len: usize,
}

impl LoopStatusView {
    pub fn new(state: &LoopState, recent_decisions: Vec<Decision>, history_len: usize) -> Self {
        Self {
            running: state.running,
            total_decisions: state.total_decisions,
            total_actions: state.total_actions,
            successful_actions: state.successful_actions,
            success_rate: state.success_rate(),
            last_action_at: state.last_action_at,
            last_interval: state.last_interval,
            gather_failures: state.gather_failures,
            persistence_failures: state.persistence_failures,
            recent_decisions,
            history_len,
        }
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        let interval = self
            .last_interval
            .map(|d| format!("{:.0}s", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "decisions={} actions={}/{} success_rate={:.2} next={}",
            self.total_decisions, self.successful_actions, self.total_actions, self.success_rate, interval
        )
    }
}
