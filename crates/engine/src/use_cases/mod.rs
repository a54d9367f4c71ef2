//! Use cases - session orchestration over the ports.
//!
//! Each module holds one service area. They all fail with `ServiceError` so
//! the socket layer maps outcomes to wire error codes in one place; domain
//! errors fold into it through the `From` impls below.

pub mod dice;
pub mod initiative;
pub mod overlays;
pub mod permissions;
pub mod scenes;
pub mod session;
pub mod tokens;

pub use dice::{DiceOps, RolledDice};
pub use initiative::{InitiativeOps, RemovedEntry, RenamedEntry, TurnOutcome};
pub use overlays::OverlayOps;
pub use scenes::{CreatedScene, DeletedScene, SceneOps, SceneSwitch};
pub use session::{SessionOps, SessionSnapshot};
pub use tokens::{EditOutcome, EditTokenInput, MoveOutcome, PlaceTokenInput, PlacedToken, TokenOps};

use gridhall_domain::{
    DiceParseError, GridError, InitiativeError, InvalidTransition, SceneError, TableError,
    TokenError,
};

use crate::infrastructure::overlay::OverlayError;
use crate::infrastructure::ports::RepoError;

/// Failure of a service operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("move costs {required:.1} movement but only {available:.1} remains")]
    InsufficientMovement { required: f64, available: f64 },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Overlay storage error: {0}")]
    Overlay(#[from] OverlayError),
}

impl From<GridError> for ServiceError {
    fn from(e: GridError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<TokenError> for ServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InsufficientMovement {
                required,
                available,
            } => Self::InsufficientMovement {
                required,
                available,
            },
            TokenError::NoHistory => Self::Conflict(e.to_string()),
        }
    }
}

impl From<InitiativeError> for ServiceError {
    fn from(e: InitiativeError) -> Self {
        match e {
            InitiativeError::EntryNotFound => Self::NotFound("initiative entry"),
            other => Self::Conflict(other.to_string()),
        }
    }
}

impl From<SceneError> for ServiceError {
    fn from(e: SceneError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<TableError> for ServiceError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::UnknownScene => Self::NotFound("scene"),
            TableError::InvalidSceneOrder => Self::Conflict(e.to_string()),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(e: InvalidTransition) -> Self {
        Self::Conflict(e.to_string())
    }
}

impl From<DiceParseError> for ServiceError {
    fn from(e: DiceParseError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}
