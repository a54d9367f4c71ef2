//! Overlay value objects: measurements and auras.
//!
//! These never touch the document store; they live in the overlay store and
//! are broadcast to the table's room as they change.

use serde::{Deserialize, Serialize};

use crate::{SceneId, TokenId, UserId};

/// A point on the scene canvas, in grid-square units (fractional while
/// dragging).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Shape of a measurement. Closed set: unknown shapes are a validation
/// error, not a passthrough string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementKind {
    Ruler,
    Cone,
    Circle,
    Square,
    Line,
    Beam,
}

impl std::fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ruler => write!(f, "ruler"),
            Self::Cone => write!(f, "cone"),
            Self::Circle => write!(f, "circle"),
            Self::Square => write!(f, "square"),
            Self::Line => write!(f, "line"),
            Self::Beam => write!(f, "beam"),
        }
    }
}

impl std::str::FromStr for MeasurementKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ruler" => Ok(Self::Ruler),
            "cone" => Ok(Self::Cone),
            "circle" => Ok(Self::Circle),
            "square" => Ok(Self::Square),
            "line" => Ok(Self::Line),
            "beam" => Ok(Self::Beam),
            _ => Err(()),
        }
    }
}

/// Geometry of a drawn shape: kind plus the drag from origin to target.
/// For circles the origin-target distance is the radius; for cones and
/// beams the target fixes direction and reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeGeometry {
    pub kind: MeasurementKind,
    pub origin: Point,
    pub target: Point,
}

impl ShapeGeometry {
    pub fn new(kind: MeasurementKind, origin: Point, target: Point) -> Self {
        Self {
            kind,
            origin,
            target,
        }
    }
}

/// A user's transient measurement on the active scene. One per (table, user);
/// the next shape the user draws replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub user_id: UserId,
    pub scene_id: SceneId,
    pub geometry: ShapeGeometry,
    pub color: Option<String>,
}

impl Measurement {
    pub fn new(user_id: UserId, scene_id: SceneId, geometry: ShapeGeometry) -> Self {
        Self {
            user_id,
            scene_id,
            geometry,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A measurement pinned to the scene until explicitly removed or the scene
/// is cleared. Identified by a short random id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentMeasurement {
    pub id: String,
    pub scene_id: SceneId,
    pub created_by: UserId,
    pub geometry: ShapeGeometry,
    pub color: Option<String>,
}

impl PersistentMeasurement {
    pub fn new(
        id: impl Into<String>,
        scene_id: SceneId,
        created_by: UserId,
        geometry: ShapeGeometry,
    ) -> Self {
        Self {
            id: id.into(),
            scene_id,
            created_by,
            geometry,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A radius effect anchored to a token's identity. At most one per token per
/// scene; upserting replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aura {
    pub token_id: TokenId,
    pub scene_id: SceneId,
    pub created_by: UserId,
    pub radius_meters: f64,
    pub color: Option<String>,
}

impl Aura {
    pub fn new(token_id: TokenId, scene_id: SceneId, created_by: UserId, radius_meters: f64) -> Self {
        Self {
            token_id,
            scene_id,
            created_by,
            radius_meters,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}
