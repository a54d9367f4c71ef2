// Port traits carry the full contract - not every method has a caller yet
#![allow(dead_code)]

//! Testability ports for injecting time and randomness.

use chrono::{DateTime, Utc};

// =============================================================================
// Testability Ports
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomPort: Send + Sync {
    /// One die roll, uniform in `1..=sides`.
    fn roll_die(&self, sides: u32) -> u32;

    /// Short url-safe id for persistent measurements.
    fn short_id(&self) -> String;
}
