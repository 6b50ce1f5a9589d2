//! Signal gathering - where the loop's observations come from.
//!
//! - `SignalSource`: trait the control loop calls once per iteration
//! - `SystemSignalSource`: clock + health monitor + seeded exploration
//! - `HealthMonitor`: external snapshot provider

mod health;
mod source;

pub use health::{FileHealthMonitor, HealthMonitor, StaticHealthMonitor, UnavailableHealthMonitor};
pub use source::{GatherContext, SignalSource, SignalSourceConfig, SystemSignalSource};
