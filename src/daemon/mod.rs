//! Daemon core - the control loop and its worker
//!
//! - `ControlLoop`: lifecycle (start/stop), force_action, status
//! - worker: gather -> score -> act -> record -> cancellable sleep
//! - `LoopStatusView`: snapshot handed to callers

mod control;
mod status;
mod worker;

pub use control::{
    ControlLoop, DEFAULT_CALL_TIMEOUT, DEFAULT_GATHER_BACKOFF, DEFAULT_SLEEP_SLICE, DEFAULT_STATUS_TAIL,
    DEFAULT_STOP_TIMEOUT, IterationOutcome, LoopConfig,
};
pub use status::LoopStatusView;
pub use worker::{METRIC_ACTION_IMPACT, METRIC_DECISION_SCORE, METRIC_NEXT_INTERVAL, sleep_cancellable};
