//! Square-grid geometry: square ids, footprints, bounds and movement cost.
//!
//! A square id encodes the linear index `i = y * width + x` of a cell and
//! travels over the wire as the string `sq-<i>`. All functions here are pure;
//! callers read tokens from storage and pass them in for collision checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entities::Token;
use crate::TokenId;

/// One cell of a scene grid, addressed by linear index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SquareId(u32);

impl SquareId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SquareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sq-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid square id '{0}', expected 'sq-<index>'")]
pub struct ParseSquareIdError(String);

impl FromStr for SquareId {
    type Err = ParseSquareIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let index = s
            .strip_prefix("sq-")
            .and_then(|rest| rest.parse::<u32>().ok())
            .ok_or_else(|| ParseSquareIdError(s.to_string()))?;
        Ok(Self(index))
    }
}

impl Serialize for SquareId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SquareId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Token size class. Maps to the edge length N of the N×N footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenSize {
    Medium,
    Large,
    Huge,
    Gargantuan,
    Colossal,
}

impl TokenSize {
    /// Edge length of the footprint in squares.
    pub fn edge(&self) -> u32 {
        match self {
            Self::Medium => 1,
            Self::Large => 2,
            Self::Huge => 3,
            Self::Gargantuan => 4,
            Self::Colossal => 5,
        }
    }
}

impl Default for TokenSize {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for TokenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
            Self::Huge => write!(f, "huge"),
            Self::Gargantuan => write!(f, "gargantuan"),
            Self::Colossal => write!(f, "colossal"),
        }
    }
}

impl FromStr for TokenSize {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "huge" => Ok(Self::Huge),
            "gargantuan" => Ok(Self::Gargantuan),
            "colossal" => Ok(Self::Colossal),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("square {square} is outside the {width}x{height} grid")]
    OutOfBounds {
        square: SquareId,
        width: u32,
        height: u32,
    },
}

/// Decode a square id into `(x, y)` coordinates for a grid of the given width.
///
/// `width` must be positive (scene invariant).
pub fn to_coords(id: SquareId, width: u32) -> (u32, u32) {
    (id.index() % width, id.index() / width)
}

/// Encode `(x, y)` coordinates into a square id for a grid of the given width.
pub fn to_id(x: u32, y: u32, width: u32) -> SquareId {
    SquareId::new(y * width + x)
}

/// Whether the square lies inside a `width` × `height` grid.
pub fn is_inside_grid(id: SquareId, width: u32, height: u32) -> bool {
    (id.index() as u64) < (width as u64) * (height as u64)
}

/// The N×N block of squares a token of `size` occupies when anchored at
/// `anchor` (top-left cell). Fails when any cell of the block would fall
/// outside the grid; never returns a partial footprint.
pub fn footprint_squares(
    anchor: SquareId,
    size: TokenSize,
    width: u32,
    height: u32,
) -> Result<Vec<SquareId>, GridError> {
    let (x, y) = to_coords(anchor, width);
    let edge = size.edge();
    let mut squares = Vec::with_capacity((edge * edge) as usize);

    for dy in 0..edge {
        for dx in 0..edge {
            let (cx, cy) = (x + dx, y + dy);
            if cx >= width || cy >= height {
                return Err(GridError::OutOfBounds {
                    square: anchor,
                    width,
                    height,
                });
            }
            squares.push(to_id(cx, cy, width));
        }
    }

    Ok(squares)
}

/// Movement cost between two squares: Chebyshev (king-move) distance times
/// the scene's distance scale. Diagonal steps cost the same as orthogonal.
pub fn movement_cost(from: SquareId, to: SquareId, width: u32, meters_per_square: f64) -> f64 {
    let (fx, fy) = to_coords(from, width);
    let (tx, ty) = to_coords(to, width);
    let dx = fx.abs_diff(tx);
    let dy = fy.abs_diff(ty);
    f64::from(dx.max(dy)) * meters_per_square
}

/// Whether `footprint` overlaps any existing token's footprint.
///
/// Tokens flagged `can_overlap` are non-solid: they neither block nor are
/// blocked. `ignore` excludes the moving token itself from the check.
pub fn collides(
    tokens: &[Token],
    footprint: &[SquareId],
    width: u32,
    height: u32,
    ignore: Option<TokenId>,
) -> bool {
    tokens.iter().any(|token| {
        if Some(token.id) == ignore || token.can_overlap {
            return false;
        }
        match footprint_squares(token.square, token.size, width, height) {
            Ok(occupied) => occupied.iter().any(|cell| footprint.contains(cell)),
            // Stored tokens satisfy the containment invariant; anything else
            // cannot be meaningfully collided with.
            Err(_) => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SceneId, TableId};

    fn token_at(square: SquareId, size: TokenSize, can_overlap: bool) -> Token {
        let mut token = Token::new(
            TableId::new(),
            SceneId::new(),
            "Goblin",
            square,
            size,
            30.0,
        );
        token.can_overlap = can_overlap;
        token
    }

    mod square_ids {
        use super::*;

        #[test]
        fn display_uses_sq_prefix() {
            assert_eq!(SquareId::new(42).to_string(), "sq-42");
        }

        #[test]
        fn parses_wire_form() {
            let id: SquareId = "sq-7".parse().unwrap();
            assert_eq!(id.index(), 7);
        }

        #[test]
        fn rejects_malformed_ids() {
            assert!("7".parse::<SquareId>().is_err());
            assert!("sq-".parse::<SquareId>().is_err());
            assert!("sq--1".parse::<SquareId>().is_err());
            assert!("square-7".parse::<SquareId>().is_err());
        }

        #[test]
        fn serde_round_trips_as_string() {
            let json = serde_json::to_string(&SquareId::new(3)).unwrap();
            assert_eq!(json, "\"sq-3\"");
            let back: SquareId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, SquareId::new(3));
        }
    }

    mod coords {
        use super::*;

        #[test]
        fn to_coords_decodes_linear_index() {
            assert_eq!(to_coords(SquareId::new(0), 10), (0, 0));
            assert_eq!(to_coords(SquareId::new(9), 10), (9, 0));
            assert_eq!(to_coords(SquareId::new(10), 10), (0, 1));
            assert_eq!(to_coords(SquareId::new(23), 10), (3, 2));
        }

        #[test]
        fn to_id_round_trips() {
            for index in [0u32, 1, 9, 10, 55, 99] {
                let id = SquareId::new(index);
                let (x, y) = to_coords(id, 10);
                assert_eq!(to_id(x, y, 10), id);
            }
        }

        #[test]
        fn bounds_check_respects_height() {
            assert!(is_inside_grid(SquareId::new(99), 10, 10));
            assert!(!is_inside_grid(SquareId::new(100), 10, 10));
        }
    }

    mod footprints {
        use super::*;

        #[test]
        fn large_token_occupies_two_by_two_block() {
            let cells = footprint_squares(SquareId::new(0), TokenSize::Large, 10, 10).unwrap();
            let expected: Vec<SquareId> =
                [0u32, 1, 10, 11].iter().map(|&i| SquareId::new(i)).collect();
            assert_eq!(cells, expected);
        }

        #[test]
        fn large_token_at_right_edge_is_out_of_bounds() {
            let err = footprint_squares(SquareId::new(9), TokenSize::Large, 10, 10).unwrap_err();
            assert_eq!(
                err,
                GridError::OutOfBounds {
                    square: SquareId::new(9),
                    width: 10,
                    height: 10,
                }
            );
        }

        #[test]
        fn footprint_is_never_partial() {
            for size in [
                TokenSize::Medium,
                TokenSize::Large,
                TokenSize::Huge,
                TokenSize::Gargantuan,
                TokenSize::Colossal,
            ] {
                for anchor in 0..100u32 {
                    match footprint_squares(SquareId::new(anchor), size, 10, 10) {
                        Ok(cells) => {
                            let edge = size.edge();
                            assert_eq!(cells.len() as u32, edge * edge);
                            assert!(cells.iter().all(|&c| is_inside_grid(c, 10, 10)));
                        }
                        Err(GridError::OutOfBounds { .. }) => {}
                    }
                }
            }
        }

        #[test]
        fn anchor_past_last_row_is_out_of_bounds() {
            assert!(footprint_squares(SquareId::new(100), TokenSize::Medium, 10, 10).is_err());
        }
    }

    mod movement {
        use super::*;

        #[test]
        fn diagonal_distance_uses_chebyshev() {
            // sq-0 is (0,0); sq-44 is (4,4) on a 10-wide grid: 4 king moves.
            let cost = movement_cost(SquareId::new(0), SquareId::new(44), 10, 1.5);
            assert!((cost - 6.0).abs() < f64::EPSILON);
        }

        #[test]
        fn orthogonal_and_diagonal_cost_the_same_per_square() {
            let straight = movement_cost(SquareId::new(0), SquareId::new(4), 10, 1.5);
            let diagonal = movement_cost(SquareId::new(0), SquareId::new(44), 10, 1.5);
            assert!((straight - diagonal).abs() < f64::EPSILON);
        }

        #[test]
        fn zero_distance_costs_nothing() {
            assert_eq!(movement_cost(SquareId::new(5), SquareId::new(5), 10, 1.5), 0.0);
        }
    }

    mod collision {
        use super::*;

        #[test]
        fn overlapping_footprints_collide() {
            let existing = vec![token_at(SquareId::new(0), TokenSize::Large, false)];
            let incoming = footprint_squares(SquareId::new(11), TokenSize::Large, 10, 10).unwrap();
            assert!(collides(&existing, &incoming, 10, 10, None));
        }

        #[test]
        fn disjoint_footprints_do_not_collide() {
            let existing = vec![token_at(SquareId::new(0), TokenSize::Large, false)];
            let incoming = footprint_squares(SquareId::new(22), TokenSize::Large, 10, 10).unwrap();
            assert!(!collides(&existing, &incoming, 10, 10, None));
        }

        #[test]
        fn non_solid_tokens_do_not_block() {
            let existing = vec![token_at(SquareId::new(0), TokenSize::Large, true)];
            let incoming = footprint_squares(SquareId::new(0), TokenSize::Medium, 10, 10).unwrap();
            assert!(!collides(&existing, &incoming, 10, 10, None));
        }

        #[test]
        fn moving_token_ignores_its_own_squares() {
            let existing = vec![token_at(SquareId::new(0), TokenSize::Large, false)];
            let own_id = existing[0].id;
            let incoming = footprint_squares(SquareId::new(1), TokenSize::Large, 10, 10).unwrap();
            assert!(!collides(&existing, &incoming, 10, 10, Some(own_id)));
        }
    }
}
