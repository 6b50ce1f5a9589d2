//! Domain types for autoloop
//!
//! This module contains all core domain types:
//! - Signal: a normalized [0, 1] observation
//! - Decision: the record of one scoring pass
//! - ActionResult / ActionRecord: what an executed action reported
//! - LoopState: counters owned by the control loop

pub mod action;
pub mod decision;
pub mod signal;
pub mod state;

pub use action::{ActionRecord, ActionResult};
pub use decision::Decision;
pub use signal::{Signal, clamp_unit, signal_names};
pub use state::LoopState;
