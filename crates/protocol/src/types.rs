//! Wire-format DTOs for session state
//!
//! These mirror the domain entities field by field but carry raw `Uuid`s and
//! RFC 3339 timestamp strings so clients never depend on domain internals.
//! Vocabulary value types (square ids, token sizes, shape geometry) serialize
//! the same on both sides and are reused from the domain directly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gridhall_domain::{
    Aura, Character, DiceRollResult, InitiativeEntry, Measurement, MeasurementKind,
    PersistentMeasurement, Point, Scene, ShapeGeometry, SquareId, Table, Token, TokenSize,
};

// =============================================================================
// Table
// =============================================================================

/// Snapshot of a table for the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    pub id: Uuid,
    pub name: String,
    pub game_master: Uuid,
    pub members: Vec<Uuid>,
    pub invite_code: String,
    pub status: crate::messages::SessionStatusData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_until: Option<String>,
    /// Scene ids in display order
    pub scene_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_scene_id: Option<Uuid>,
}

impl From<&Table> for TableData {
    fn from(table: &Table) -> Self {
        Self {
            id: table.id.to_uuid(),
            name: table.name.clone(),
            game_master: table.game_master.to_uuid(),
            members: table.members.iter().map(|m| m.to_uuid()).collect(),
            invite_code: table.invite_code.clone(),
            status: table.status.into(),
            paused_until: table.paused_until.map(|t| t.to_rfc3339()),
            scene_ids: table.scenes.iter().map(|s| s.to_uuid()).collect(),
            active_scene_id: table.active_scene.map(|s| s.to_uuid()),
        }
    }
}

// =============================================================================
// Scene
// =============================================================================

/// Snapshot of a scene, including its initiative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneData {
    pub id: Uuid,
    pub table_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_asset: Option<String>,
    pub grid_width: u32,
    pub grid_height: u32,
    pub meters_per_square: f64,
    pub initiative: Vec<InitiativeEntryData>,
}

impl From<&Scene> for SceneData {
    fn from(scene: &Scene) -> Self {
        Self {
            id: scene.id.to_uuid(),
            table_id: scene.table_id.to_uuid(),
            name: scene.name.clone(),
            map_asset: scene.map_asset.clone(),
            grid_width: scene.grid_width,
            grid_height: scene.grid_height,
            meters_per_square: scene.meters_per_square,
            initiative: scene.initiative.iter().map(InitiativeEntryData::from).collect(),
        }
    }
}

/// One row of a scene's initiative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeEntryData {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<Uuid>,
    pub is_current_turn: bool,
}

impl From<&InitiativeEntry> for InitiativeEntryData {
    fn from(entry: &InitiativeEntry) -> Self {
        Self {
            id: entry.id.to_uuid(),
            name: entry.name.clone(),
            token_id: entry.token_id.map(|t| t.to_uuid()),
            is_current_turn: entry.is_current_turn,
        }
    }
}

// =============================================================================
// Token
// =============================================================================

/// Snapshot of a token on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub id: Uuid,
    pub scene_id: Uuid,
    pub name: String,
    pub square_id: SquareId,
    pub size: TokenSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<Uuid>,
    pub can_overlap: bool,
    pub movement_max: f64,
    pub movement_left: f64,
    pub move_history: Vec<SquareId>,
}

impl From<&Token> for TokenData {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.to_uuid(),
            scene_id: token.scene_id.to_uuid(),
            name: token.name.clone(),
            square_id: token.square,
            size: token.size,
            color: token.color.clone(),
            image_asset: token.image_asset.clone(),
            owner: token.owner.map(|o| o.to_uuid()),
            character_id: token.character_id.map(|c| c.to_uuid()),
            can_overlap: token.can_overlap,
            movement_max: token.movement_max,
            movement_left: token.movement_left,
            move_history: token.move_history.clone(),
        }
    }
}

// =============================================================================
// Character
// =============================================================================

/// Snapshot of a character stub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterData {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_asset: Option<String>,
}

impl From<&Character> for CharacterData {
    fn from(character: &Character) -> Self {
        Self {
            id: character.id.to_uuid(),
            owner: character.owner.to_uuid(),
            name: character.name.clone(),
            avatar_asset: character.avatar_asset.clone(),
        }
    }
}

// =============================================================================
// Overlays
// =============================================================================

/// A live measurement, one per user per table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementData {
    pub user_id: Uuid,
    pub scene_id: Uuid,
    pub geometry: ShapeGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl From<&Measurement> for MeasurementData {
    fn from(m: &Measurement) -> Self {
        Self {
            user_id: m.user_id.to_uuid(),
            scene_id: m.scene_id.to_uuid(),
            geometry: m.geometry.clone(),
            color: m.color.clone(),
        }
    }
}

/// A pinned measurement that outlives its author's connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentMeasurementData {
    pub id: String,
    pub scene_id: Uuid,
    pub created_by: Uuid,
    pub geometry: ShapeGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl From<&PersistentMeasurement> for PersistentMeasurementData {
    fn from(m: &PersistentMeasurement) -> Self {
        Self {
            id: m.id.clone(),
            scene_id: m.scene_id.to_uuid(),
            created_by: m.created_by.to_uuid(),
            geometry: m.geometry.clone(),
            color: m.color.clone(),
        }
    }
}

/// A radius overlay attached to a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuraData {
    pub token_id: Uuid,
    pub scene_id: Uuid,
    pub created_by: Uuid,
    pub radius_meters: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl From<&Aura> for AuraData {
    fn from(aura: &Aura) -> Self {
        Self {
            token_id: aura.token_id.to_uuid(),
            scene_id: aura.scene_id.to_uuid(),
            created_by: aura.created_by.to_uuid(),
            radius_meters: aura.radius_meters,
            color: aura.color.clone(),
        }
    }
}

/// Geometry for a shared measurement, sent by clients.
///
/// Same shape as the stored geometry; kept as its own type so client payloads
/// stay decoupled from the domain value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeGeometryData {
    pub kind: MeasurementKind,
    pub origin: Point,
    pub target: Point,
}

impl From<ShapeGeometryData> for ShapeGeometry {
    fn from(data: ShapeGeometryData) -> Self {
        ShapeGeometry {
            kind: data.kind,
            origin: data.origin,
            target: data.target,
        }
    }
}

// =============================================================================
// Dice
// =============================================================================

/// Outcome of a dice roll, broadcast to the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRollData {
    pub user_id: Uuid,
    /// Character the roll is attributed to, when any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<Uuid>,
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub individual_rolls: Vec<i32>,
    pub kept_rolls: Vec<i32>,
    pub dropped_rolls: Vec<i32>,
    pub modifier: i32,
    pub total: i32,
    /// Human-readable form, e.g. `4d6kh3[6, 5, 4, (1)] = 15`
    pub breakdown: String,
}

impl DiceRollData {
    pub fn from_result(user_id: Uuid, result: &DiceRollResult, label: Option<String>) -> Self {
        Self {
            user_id,
            character_id: None,
            formula: result.formula.to_string(),
            label,
            individual_rolls: result.individual_rolls.clone(),
            kept_rolls: result.kept_rolls.clone(),
            dropped_rolls: result.dropped_rolls.clone(),
            modifier: result.modifier_applied,
            total: result.total,
            breakdown: result.breakdown(),
        }
    }

    pub fn with_character(mut self, character_id: Uuid) -> Self {
        self.character_id = Some(character_id);
        self
    }
}
