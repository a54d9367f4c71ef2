// Port traits carry the full contract - not every method has a caller yet
#![allow(dead_code)]

//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine. Everything else is concrete
//! types. Ports exist for:
//! - Document storage (could swap the in-memory store for a database)
//! - Overlay storage lives in `infrastructure::overlay` (memory vs sqlite)
//! - Credential verification (dev registry vs real identity provider)
//! - Clock/Random (for testing)

mod auth;
mod error;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{CharacterRepo, SceneRepo, TableRepo, TokenRepo};

#[cfg(test)]
pub use repos::{MockCharacterRepo, MockSceneRepo, MockTableRepo, MockTokenRepo};

// =============================================================================
// Credential Port
// =============================================================================
pub use auth::AuthPort;

#[cfg(test)]
pub use auth::MockAuthPort;

// =============================================================================
// Testability Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Errors
// =============================================================================
pub use error::{AuthError, RepoError};
