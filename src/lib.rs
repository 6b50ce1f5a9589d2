//! Autoloop - an autonomous decision loop
//!
//! A background worker periodically gathers normalized signals, scores them
//! against a weight table, acts when the score crosses a threshold, records
//! every decision and action, and adapts its own polling interval from the
//! latest score and the running action success rate.

pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod executor;
pub mod history;
pub mod id;
pub mod policy;
pub mod signals;
pub mod storage;

pub use daemon::{ControlLoop, LoopConfig, LoopStatusView};
pub use error::{AutoloopError, Result};
