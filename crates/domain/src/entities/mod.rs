//! Domain entities

pub mod character;
pub mod scene;
pub mod table;
pub mod token;

pub use character::Character;
pub use scene::{
    InitiativeEntry, InitiativeError, Scene, SceneError, TurnAdvance, DEFAULT_GRID_HEIGHT,
    DEFAULT_GRID_WIDTH, DEFAULT_METERS_PER_SQUARE,
};
pub use table::{InvalidTransition, Table, TableError, TableStatus};
pub use token::{Token, TokenError, DEFAULT_MOVEMENT_MAX};
