//! Scoring and scheduling policy.
//!
//! - `WeightTable`: signal name to non-negative weight
//! - `DecisionPolicy`: weighted score and act/wait verdict
//! - `IntervalTuner`: next poll delay from score and success history

mod decision;
mod interval;
mod weights;

pub use decision::{DEFAULT_ACTION_THRESHOLD, DecisionPolicy};
pub use interval::{DEFAULT_BASE_INTERVAL, DEFAULT_MAX_INTERVAL, DEFAULT_MIN_INTERVAL, IntervalTuner, next_interval};
pub use weights::WeightTable;
