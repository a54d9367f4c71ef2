//! Infrastructure: everything behind the port traits.
//!
//! Storage, clocks, randomness and credential checks live here; the service
//! layer only ever sees the traits in `ports` and `overlay`.

pub mod auth;
pub mod clock;
pub mod memory;
pub mod overlay;
pub mod ports;
pub mod scene_locks;
