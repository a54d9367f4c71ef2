//! Table entity - one campaign table with its members, scenes and session status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{SceneId, TableId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableError {
    /// The scene id is not attached to this table
    #[error("scene does not belong to this table")]
    UnknownScene,
    /// A scene reorder must be a permutation of the attached scene ids
    #[error("reorder does not match the table's scenes")]
    InvalidSceneOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move session from {from} to {to}")]
pub struct InvalidTransition {
    pub from: TableStatus,
    pub to: TableStatus,
}

/// Session lifecycle of a table.
///
/// Legal transitions: `PREPARING -> LIVE`, `LIVE <-> PAUSED`, and
/// `LIVE`/`PAUSED -> `ENDED`. `ENDED` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Preparing,
    Live,
    Paused,
    Ended,
}

impl TableStatus {
    pub fn can_transition_to(self, next: TableStatus) -> bool {
        use TableStatus::*;
        matches!(
            (self, next),
            (Preparing, Live) | (Live, Paused) | (Live, Ended) | (Paused, Live) | (Paused, Ended)
        )
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableStatus::Preparing => "PREPARING",
            TableStatus::Live => "LIVE",
            TableStatus::Paused => "PAUSED",
            TableStatus::Ended => "ENDED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TableStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PREPARING" => Ok(TableStatus::Preparing),
            "LIVE" => Ok(TableStatus::Live),
            "PAUSED" => Ok(TableStatus::Paused),
            "ENDED" => Ok(TableStatus::Ended),
            _ => Err(format!("unknown table status: {s}")),
        }
    }
}

/// A campaign table. The game master owns the session; members may hold
/// tokens and characters. Scenes keep their creation order in `scenes`;
/// `active_scene` is the one everybody currently sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub game_master: UserId,
    pub members: Vec<UserId>,
    pub invite_code: String,
    pub status: TableStatus,
    /// Set while the session is paused with a planned resume time
    pub paused_until: Option<DateTime<Utc>>,
    pub scenes: Vec<SceneId>,
    pub active_scene: Option<SceneId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table {
    pub fn new(name: impl Into<String>, game_master: UserId, invite_code: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TableId::new(),
            name: name.into(),
            game_master,
            members: vec![game_master],
            invite_code: invite_code.into(),
            status: TableStatus::Preparing,
            paused_until: None,
            scenes: Vec::new(),
            active_scene: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_game_master(&self, user_id: UserId) -> bool {
        self.game_master == user_id
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Add a member, keeping join order. Adding twice is a no-op.
    pub fn add_member(&mut self, user_id: UserId, now: DateTime<Utc>) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.members.push(user_id);
        self.updated_at = now;
        true
    }

    /// Move the session to `next`, enforcing the lifecycle. `paused_until`
    /// only survives while the session is paused.
    pub fn set_status(
        &mut self,
        next: TableStatus,
        paused_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.paused_until = if next == TableStatus::Paused {
            paused_until
        } else {
            None
        };
        self.updated_at = now;
        Ok(())
    }

    // ===== Scenes =====

    pub fn has_scene(&self, scene_id: SceneId) -> bool {
        self.scenes.contains(&scene_id)
    }

    /// Attach a scene at the end of the list. The first scene attached
    /// becomes the active one.
    pub fn add_scene(&mut self, scene_id: SceneId, now: DateTime<Utc>) {
        if !self.has_scene(scene_id) {
            self.scenes.push(scene_id);
            if self.active_scene.is_none() {
                self.active_scene = Some(scene_id);
            }
            self.updated_at = now;
        }
    }

    /// Detach a scene. When the active scene goes away the first remaining
    /// scene takes over, or the pointer clears.
    pub fn detach_scene(&mut self, scene_id: SceneId, now: DateTime<Utc>) -> Result<(), TableError> {
        let index = self
            .scenes
            .iter()
            .position(|s| *s == scene_id)
            .ok_or(TableError::UnknownScene)?;
        self.scenes.remove(index);
        if self.active_scene == Some(scene_id) {
            self.active_scene = self.scenes.first().copied();
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_active_scene(&mut self, scene_id: SceneId, now: DateTime<Utc>) -> Result<(), TableError> {
        if !self.has_scene(scene_id) {
            return Err(TableError::UnknownScene);
        }
        self.active_scene = Some(scene_id);
        self.updated_at = now;
        Ok(())
    }

    /// Replace the scene order with the given permutation of the attached ids.
    pub fn reorder_scenes(
        &mut self,
        ordered_ids: &[SceneId],
        now: DateTime<Utc>,
    ) -> Result<(), TableError> {
        if ordered_ids.len() != self.scenes.len() {
            return Err(TableError::InvalidSceneOrder);
        }
        let mut seen = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            if !self.has_scene(*id) || seen.contains(id) {
                return Err(TableError::InvalidSceneOrder);
            }
            seen.push(*id);
        }
        self.scenes = seen;
        self.updated_at = now;
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
