//! ID generation utilities for autoloop
//!
//! Provides functions for generating identifiers for decisions and actions.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn generate_id(prefix: &str) -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{}-{:04x}", prefix, timestamp, random)
}

/// Generate a decision ID
///
/// Format: `dec-{timestamp_ms}-{random_hex}`
pub fn generate_decision_id() -> String {
    generate_id("dec")
}

/// Generate an action ID
///
/// Format: `act-{timestamp_ms}-{random_hex}`
pub fn generate_action_id() -> String {
    generate_id("act")
}
