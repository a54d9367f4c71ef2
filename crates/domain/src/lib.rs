extern crate self as gridhall_domain;

pub mod entities;
pub mod ids;
pub mod value_objects;

// Re-export all entities (explicit list in entities/mod.rs)
pub use entities::{
    Character, InitiativeEntry, InitiativeError, InvalidTransition, Scene, SceneError, Table,
    TableError, TableStatus, Token, TokenError, TurnAdvance, DEFAULT_GRID_HEIGHT,
    DEFAULT_GRID_WIDTH, DEFAULT_METERS_PER_SQUARE, DEFAULT_MOVEMENT_MAX,
};

// Re-export ID types
pub use ids::{CharacterId, EntryId, SceneId, TableId, TokenId, UserId};

// Re-export value objects (explicit list in value_objects/mod.rs)
pub use value_objects::{
    collides, footprint_squares, is_inside_grid, movement_cost, to_coords, to_id, Aura,
    DiceFormula, DiceParseError, DiceRollResult, GridError, KeepRule, Measurement,
    MeasurementKind, ParseSquareIdError, PersistentMeasurement, Point, ShapeGeometry, SquareId,
    TokenSize,
};
