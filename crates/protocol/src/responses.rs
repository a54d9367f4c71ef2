//! Error classification for rejected requests
//!
//! Every rejected client request produces exactly one reply to the requester,
//! carrying one of these codes. Codes are stable wire strings; messages are
//! free-form prose for the user.

use serde::{Deserialize, Serialize};

// =============================================================================
// Error Codes
// =============================================================================

/// Error classification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request data failed validation (bad formula, malformed square id, ...)
    ValidationError,
    /// Requested resource does not exist
    NotFound,
    /// Requester lacks permission for this operation
    Forbidden,
    /// Connection carries no valid identity
    Unauthenticated,
    /// Operation conflicts with current state (occupied square, bad transition)
    Conflict,
    /// A per-user or per-table limit was hit
    ResourceExhausted,
    /// Something went wrong on the server side
    InternalError,
    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Validation Details
// =============================================================================

/// One field-level validation failure, attached to `validation_error` replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIssue {
    pub field: String,
    pub issue: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            issue: issue.into(),
        }
    }
}
