//! Action execution - runs the action a decision selected.
//!
//! Execution is isolated: errors and panics inside an action become a failed
//! `ActionResult` and never reach the control loop.

mod command;
mod select;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;

use crate::domain::ActionResult;
use crate::error::{AutoloopError, Result};

pub use command::{CommandAction, CommandActionConfig};
pub use select::{ActionSelector, FallbackStrategy, SelectorConfig, action_kinds, default_mapping};

/// What an action reports about itself
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Whether the action achieved its goal
    pub success: bool,
    /// Impact magnitude
    pub impact: f64,
    /// Optional detail (stderr, summary)
    pub detail: Option<String>,
}

impl ActionOutcome {
    pub fn success(impact: f64) -> Self {
        Self {
            success: true,
            impact,
            detail: None,
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            impact: 0.0,
            detail: Some(detail.into()),
        }
    }
}

/// A single executable action
#[async_trait]
pub trait Action: Send + Sync {
    /// Kind this action handles
    fn kind(&self) -> &str;

    /// Run the action
    async fn run(&self) -> Result<ActionOutcome>;
}

/// Executes an action by kind
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute the action registered for `kind`. Never fails: problems surface
    /// as `ActionResult { success: false, .. }`.
    async fn execute(&self, kind: &str) -> ActionResult;
}

/// Run an executor with panic isolation.
///
/// Executors are expected to catch their own failures; this covers the ones that don't.
pub async fn execute_isolated(executor: &dyn ActionExecutor, kind: &str) -> ActionResult {
    let started = Instant::now();
    match AssertUnwindSafe(executor.execute(kind)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => ActionResult::failed(kind, panic_message(panic.as_ref()), started.elapsed()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("action panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("action panicked: {}", s)
    } else {
        "action panicked".to_string()
    }
}

/// Executor backed by a map of kind to action
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under its kind, replacing any previous one
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.kind().to_string(), action);
    }

    /// Builder-style register
    pub fn with(mut self, action: Arc<dyn Action>) -> Self {
        self.register(action);
        self
    }

    /// Check if a kind is registered
    pub fn has_action(&self, kind: &str) -> bool {
        self.actions.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.actions.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry").field("kinds", &self.kinds()).finish()
    }
}

#[async_trait]
impl ActionExecutor for ActionRegistry {
    async fn execute(&self, kind: &str) -> ActionResult {
        let started = Instant::now();
        let Some(action) = self.actions.get(kind) else {
            let err = AutoloopError::UnknownAction(kind.to_string());
            return ActionResult::failed(kind, err.to_string(), started.elapsed());
        };

        match AssertUnwindSafe(action.run()).catch_unwind().await {
            Ok(Ok(outcome)) if outcome.success => ActionResult::succeeded(kind, outcome.impact, started.elapsed()),
            Ok(Ok(outcome)) => ActionResult::failed(
                kind,
                outcome.detail.unwrap_or_else(|| "action reported failure".to_string()),
                started.elapsed(),
            ),
            Ok(Err(e)) => {
                let err = match e {
                    AutoloopError::ActionExecution(_) => e,
                    other => AutoloopError::ActionExecution(other.to_string()),
                };
                ActionResult::failed(kind, err.to_string(), started.elapsed())
            }
            Err(panic) => ActionResult::failed(kind, panic_message(panic.as_ref()), started.elapsed()),
        }
    }
}
