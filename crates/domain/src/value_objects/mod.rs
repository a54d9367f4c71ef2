//! Value objects: pure, side-effect-free types and rules.

pub mod dice;
pub mod grid;
pub mod overlay;

pub use dice::{DiceFormula, DiceParseError, DiceRollResult, KeepRule};
pub use grid::{
    collides, footprint_squares, is_inside_grid, movement_cost, to_coords, to_id, GridError,
    ParseSquareIdError, SquareId, TokenSize,
};
pub use overlay::{
    Aura, Measurement, MeasurementKind, PersistentMeasurement, Point, ShapeGeometry,
};
