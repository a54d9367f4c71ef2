//! GridHall Protocol - Shared types for engine-client communication
//!
//! This crate contains every type that crosses the WebSocket boundary:
//! - WebSocket message types (ClientMessage, ServerMessage)
//! - Wire-format DTOs mirroring the domain entities
//! - Error classification codes
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, uuid, serde_json, and thiserror
//! 2. **No business logic** - Pure data types and serialization
//! 3. **No domain IDs** - DTOs carry raw `uuid::Uuid`; vocabulary value types
//!    (square ids, token sizes, geometry) come from the domain unchanged

pub mod messages;
pub mod responses;
pub mod types;

// =============================================================================
// WebSocket Message Types
// =============================================================================
pub use messages::{
    // Main message enums
    ClientMessage,
    ServerMessage,
    // Session lifecycle
    SessionStatusData,
    // Conversion error types
    UnknownSessionStatusError,
};

// =============================================================================
// Wire DTOs
// =============================================================================
pub use types::{
    AuraData, CharacterData, DiceRollData, InitiativeEntryData, MeasurementData,
    PersistentMeasurementData, SceneData, ShapeGeometryData, TableData, TokenData,
};

// =============================================================================
// Error Codes
// =============================================================================
pub use responses::{ErrorCode, FieldIssue};
