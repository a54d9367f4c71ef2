//! Token entity - a movable piece on a scene's grid

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_objects::{SquareId, TokenSize};
use crate::{CharacterId, SceneId, TableId, TokenId, UserId};

/// Movement budget used when a token is placed without one, in meters.
/// 9 m is six squares at the default scale.
pub const DEFAULT_MOVEMENT_MAX: f64 = 9.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenError {
    /// The move costs more than the token has left this round
    #[error("move costs {required} movement but only {available} remains")]
    InsufficientMovement { required: f64, available: f64 },
    /// Undo requested with an empty move history
    #[error("no moves to undo")]
    NoHistory,
}

/// A piece on the grid. The anchor square is the top-left cell of the
/// footprint; `move_history` is a stack of previous anchors for undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: TokenId,
    pub table_id: TableId,
    pub scene_id: SceneId,
    pub name: String,
    pub square: SquareId,
    pub size: TokenSize,
    pub color: Option<String>,
    pub image_asset: Option<String>,
    pub owner: Option<UserId>,
    pub character_id: Option<CharacterId>,
    pub can_overlap: bool,
    /// Movement budget per round, in meters
    pub movement_max: f64,
    /// Movement remaining this round, in meters
    pub movement_left: f64,
    pub move_history: Vec<SquareId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    pub fn new(
        table_id: TableId,
        scene_id: SceneId,
        name: impl Into<String>,
        square: SquareId,
        size: TokenSize,
        movement_max: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TokenId::new(),
            table_id,
            scene_id,
            name: name.into(),
            square,
            size,
            color: None,
            image_asset: None,
            owner: None,
            character_id: None,
            can_overlap: false,
            movement_max,
            movement_left: movement_max,
            move_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_image(mut self, asset: impl Into<String>) -> Self {
        self.image_asset = Some(asset.into());
        self
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_character(mut self, character_id: CharacterId) -> Self {
        self.character_id = Some(character_id);
        self
    }

    pub fn with_can_overlap(mut self, can_overlap: bool) -> Self {
        self.can_overlap = can_overlap;
        self
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner == Some(user_id)
    }

    /// Move to `target`, spending `cost` movement. The previous anchor goes
    /// onto the history stack for undo.
    pub fn apply_move(
        &mut self,
        target: SquareId,
        cost: f64,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        if cost > self.movement_left {
            return Err(TokenError::InsufficientMovement {
                required: cost,
                available: self.movement_left,
            });
        }
        self.move_history.push(self.square);
        self.square = target;
        self.movement_left -= cost;
        self.updated_at = now;
        Ok(())
    }

    /// Pop the last move, refunding the cost of the reverse move. The refund
    /// never pushes remaining movement past the budget.
    pub fn undo_move(&mut self, refund: f64, now: DateTime<Utc>) -> Result<SquareId, TokenError> {
        let previous = self.move_history.pop().ok_or(TokenError::NoHistory)?;
        self.square = previous;
        self.movement_left = (self.movement_left + refund).min(self.movement_max);
        self.updated_at = now;
        Ok(previous)
    }

    /// Restore the full movement budget and forget the round's history.
    pub fn reset_movement(&mut self, now: DateTime<Utc>) {
        self.movement_left = self.movement_max;
        self.move_history.clear();
        self.updated_at = now;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
