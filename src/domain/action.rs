//! Action result and record types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::generate_action_id;

/// Result of executing one action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// Action kind that ran
    pub kind: String,
    /// Whether the action reported success
    pub success: bool,
    /// Impact magnitude reported by the action (0 on failure)
    pub impact: f64,
    /// Wall-clock time spent executing
    pub duration: Duration,
    /// Failure detail, if any
    pub error: Option<String>,
}

impl ActionResult {
    /// Successful result
    pub fn succeeded(kind: impl Into<String>, impact: f64, duration: Duration) -> Self {
        Self {
            kind: kind.into(),
            success: true,
            impact: if impact.is_finite() { impact } else { 0.0 },
            duration,
            error: None,
        }
    }

    /// Failed result
    pub fn failed(kind: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            kind: kind.into(),
            success: false,
            impact: 0.0,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Durable record of an executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unique action identifier
    pub id: String,
    /// When execution finished
    pub timestamp: DateTime<Utc>,
    /// Action kind
    pub kind: String,
    /// Whether the action succeeded
    pub success: bool,
    /// Reported impact
    pub impact: f64,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Failure detail, if any
    #[serde(default)]
    pub error: Option<String>,
    /// Decision that triggered the action (None when forced)
    #[serde(default)]
    pub decision_id: Option<String>,
    /// Whether the action was triggered manually
    #[serde(default)]
    pub forced: bool,
}

impl ActionRecord {
    /// Build a record from an execution result
    pub fn from_result(result: &ActionResult, decision_id: Option<String>, forced: bool) -> Self {
        Self {
            id: generate_action_id(),
            timestamp: Utc::now(),
            kind: result.kind.clone(),
            success: result.success,
            impact: result.impact,
            duration_ms: result.duration.as_millis() as u64,
            error: result.error.clone(),
            decision_id,
            forced,
        }
    }
}
