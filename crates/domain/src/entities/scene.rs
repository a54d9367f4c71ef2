//! Scene entity - one battle map with its grid and initiative order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EntryId, SceneId, TableId, TokenId};

pub const DEFAULT_GRID_WIDTH: u32 = 30;
pub const DEFAULT_GRID_HEIGHT: u32 = 30;
pub const DEFAULT_METERS_PER_SQUARE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    /// Grid dimensions must be at least 1x1
    #[error("grid dimensions must be positive")]
    InvalidGridDimensions,
    /// The meters-per-square scale must be a positive finite number
    #[error("scene scale must be positive")]
    InvalidScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitiativeError {
    /// The token is already present in the initiative order
    #[error("token already has an initiative entry")]
    DuplicateEntry,
    /// No entry with that id exists
    #[error("initiative entry not found")]
    EntryNotFound,
    /// A reorder must be a permutation of the existing entry ids
    #[error("reorder does not match the current entries")]
    InvalidOrder,
    /// Turn operations need at least one entry
    #[error("initiative order is empty")]
    EmptyInitiative,
}

/// One row in a scene's initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeEntry {
    pub id: EntryId,
    pub name: String,
    /// Token this entry is linked to, if any
    pub token_id: Option<TokenId>,
    pub is_current_turn: bool,
}

impl InitiativeEntry {
    pub fn new(name: impl Into<String>, token_id: Option<TokenId>) -> Self {
        Self {
            id: EntryId::new(),
            name: name.into(),
            token_id,
            is_current_turn: false,
        }
    }
}

/// Outcome of advancing the turn marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnAdvance {
    /// Entry whose turn it now is
    pub entry_id: EntryId,
    /// True when the marker wrapped back to the first entry
    pub new_round: bool,
}

/// A battle map. Grid geometry lives in value_objects; the scene holds the
/// dimensions, the scale, and the initiative order for combat on this map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    pub table_id: TableId,
    pub name: String,
    pub map_asset: Option<String>,
    pub grid_width: u32,
    pub grid_height: u32,
    pub meters_per_square: f64,
    pub initiative: Vec<InitiativeEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scene {
    pub fn new(table_id: TableId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SceneId::new(),
            table_id,
            name: name.into(),
            map_asset: None,
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            meters_per_square: DEFAULT_METERS_PER_SQUARE,
            initiative: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_map(mut self, asset: impl Into<String>) -> Self {
        self.map_asset = Some(asset.into());
        self
    }

    pub fn rename(&mut self, name: impl Into<String>, now: DateTime<Utc>) {
        self.name = name.into();
        self.updated_at = now;
    }

    pub fn set_map(&mut self, asset: Option<String>, now: DateTime<Utc>) {
        self.map_asset = asset;
        self.updated_at = now;
    }

    pub fn set_grid_dimensions(
        &mut self,
        width: u32,
        height: u32,
        now: DateTime<Utc>,
    ) -> Result<(), SceneError> {
        if width == 0 || height == 0 {
            return Err(SceneError::InvalidGridDimensions);
        }
        self.grid_width = width;
        self.grid_height = height;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_scale(&mut self, meters_per_square: f64, now: DateTime<Utc>) -> Result<(), SceneError> {
        if !meters_per_square.is_finite() || meters_per_square <= 0.0 {
            return Err(SceneError::InvalidScale);
        }
        self.meters_per_square = meters_per_square;
        self.updated_at = now;
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    // ===== Initiative =====

    pub fn current_entry(&self) -> Option<&InitiativeEntry> {
        self.initiative.iter().find(|e| e.is_current_turn)
    }

    pub fn entry(&self, entry_id: EntryId) -> Option<&InitiativeEntry> {
        self.initiative.iter().find(|e| e.id == entry_id)
    }

    /// Append an entry at the end of the order. At most one entry per token.
    pub fn add_entry(
        &mut self,
        name: impl Into<String>,
        token_id: Option<TokenId>,
        now: DateTime<Utc>,
    ) -> Result<EntryId, InitiativeError> {
        if let Some(token_id) = token_id {
            if self.initiative.iter().any(|e| e.token_id == Some(token_id)) {
                return Err(InitiativeError::DuplicateEntry);
            }
        }
        let entry = InitiativeEntry::new(name, token_id);
        let id = entry.id;
        self.initiative.push(entry);
        self.updated_at = now;
        Ok(id)
    }

    /// Move the turn marker to the next entry, wrapping at the end. When no
    /// entry holds the marker yet the first entry goes first.
    pub fn advance_turn(&mut self, now: DateTime<Utc>) -> Result<TurnAdvance, InitiativeError> {
        if self.initiative.is_empty() {
            return Err(InitiativeError::EmptyInitiative);
        }
        let previous = self
            .initiative
            .iter()
            .position(|e| e.is_current_turn)
            .unwrap_or(self.initiative.len() - 1);
        let next = (previous + 1) % self.initiative.len();

        for entry in &mut self.initiative {
            entry.is_current_turn = false;
        }
        self.initiative[next].is_current_turn = true;
        self.updated_at = now;

        Ok(TurnAdvance {
            entry_id: self.initiative[next].id,
            new_round: next == 0,
        })
    }

    /// Remove an entry, returning it. A removed current turn is not
    /// reassigned; the next advance starts a fresh round.
    pub fn remove_entry(
        &mut self,
        entry_id: EntryId,
        now: DateTime<Utc>,
    ) -> Result<InitiativeEntry, InitiativeError> {
        let index = self
            .initiative
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or(InitiativeError::EntryNotFound)?;
        let removed = self.initiative.remove(index);
        self.updated_at = now;
        Ok(removed)
    }

    /// Replace the order with the given permutation of the existing ids.
    /// A set mismatch leaves the current order untouched.
    pub fn reorder_entries(
        &mut self,
        ordered_ids: &[EntryId],
        now: DateTime<Utc>,
    ) -> Result<(), InitiativeError> {
        if ordered_ids.len() != self.initiative.len() {
            return Err(InitiativeError::InvalidOrder);
        }
        let mut indices = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            let index = self
                .initiative
                .iter()
                .position(|e| e.id == *id)
                .ok_or(InitiativeError::InvalidOrder)?;
            if indices.contains(&index) {
                return Err(InitiativeError::InvalidOrder);
            }
            indices.push(index);
        }
        self.initiative = indices
            .into_iter()
            .map(|i| self.initiative[i].clone())
            .collect();
        self.updated_at = now;
        Ok(())
    }

    /// Rename an entry, returning its linked token id so callers can keep the
    /// token's name in sync.
    pub fn rename_entry(
        &mut self,
        entry_id: EntryId,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenId>, InitiativeError> {
        let entry = self
            .initiative
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or(InitiativeError::EntryNotFound)?;
        entry.name = name.into();
        self.updated_at = now;
        Ok(entry.token_id)
    }

    /// Drop all entries and clear the turn marker.
    pub fn reset_initiative(&mut self, now: DateTime<Utc>) {
        self.initiative.clear();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_entries(names: &[&str]) -> (Scene, Vec<EntryId>) {
        let mut scene = Scene::new(TableId::new(), "Throne Room");
        let ids = names
            .iter()
            .map(|name| scene.add_entry(*name, None, Utc::now()).unwrap())
            .collect();
        (scene, ids)
    }

    mod construction {
        use super::*;

        #[test]
        fn new_scene_uses_default_grid() {
            let scene = Scene::new(TableId::new(), "Throne Room");

            assert_eq!(scene.grid_width, DEFAULT_GRID_WIDTH);
            assert_eq!(scene.grid_height, DEFAULT_GRID_HEIGHT);
            assert_eq!(scene.meters_per_square, DEFAULT_METERS_PER_SQUARE);
            assert!(scene.initiative.is_empty());
            assert!(scene.map_asset.is_none());
        }

        #[test]
        fn grid_dimensions_must_be_positive() {
            let mut scene = Scene::new(TableId::new(), "Throne Room");

            assert_eq!(
                scene.set_grid_dimensions(0, 10, Utc::now()),
                Err(SceneError::InvalidGridDimensions)
            );
            assert_eq!(
                scene.set_grid_dimensions(10, 0, Utc::now()),
                Err(SceneError::InvalidGridDimensions)
            );
            assert!(scene.set_grid_dimensions(40, 25, Utc::now()).is_ok());
            assert_eq!((scene.grid_width, scene.grid_height), (40, 25));
        }

        #[test]
        fn scale_must_be_positive_and_finite() {
            let mut scene = Scene::new(TableId::new(), "Throne Room");

            assert_eq!(scene.set_scale(0.0, Utc::now()), Err(SceneError::InvalidScale));
            assert_eq!(scene.set_scale(-1.5, Utc::now()), Err(SceneError::InvalidScale));
            assert_eq!(
                scene.set_scale(f64::NAN, Utc::now()),
                Err(SceneError::InvalidScale)
            );
            assert!(scene.set_scale(1.0, Utc::now()).is_ok());
        }
    }

    mod turns {
        use super::*;

        #[test]
        fn first_advance_marks_the_first_entry() {
            let (mut scene, ids) = scene_with_entries(&["Alice", "Goblin"]);

            let advance = scene.advance_turn(Utc::now()).unwrap();

            assert_eq!(advance.entry_id, ids[0]);
            assert!(advance.new_round);
            assert!(scene.initiative[0].is_current_turn);
            assert!(!scene.initiative[1].is_current_turn);
        }

        #[test]
        fn advance_moves_to_next_without_new_round() {
            let (mut scene, ids) = scene_with_entries(&["Alice", "Goblin"]);
            scene.advance_turn(Utc::now()).unwrap();

            let advance = scene.advance_turn(Utc::now()).unwrap();

            assert_eq!(advance.entry_id, ids[1]);
            assert!(!advance.new_round);
        }

        #[test]
        fn wrap_around_signals_new_round_exactly_once() {
            let (mut scene, ids) = scene_with_entries(&["Alice", "Goblin", "Wolf"]);
            scene.advance_turn(Utc::now()).unwrap();

            let mut new_rounds = 0;
            let mut last = None;
            for _ in 0..scene.initiative.len() {
                let advance = scene.advance_turn(Utc::now()).unwrap();
                if advance.new_round {
                    new_rounds += 1;
                }
                last = Some(advance.entry_id);
            }

            // A full cycle lands back on the same entry with one wrap.
            assert_eq!(new_rounds, 1);
            assert_eq!(last, Some(ids[0]));
        }

        #[test]
        fn exactly_one_entry_holds_the_marker() {
            let (mut scene, _) = scene_with_entries(&["Alice", "Goblin", "Wolf"]);
            for _ in 0..5 {
                scene.advance_turn(Utc::now()).unwrap();
                let marked = scene.initiative.iter().filter(|e| e.is_current_turn).count();
                assert_eq!(marked, 1);
            }
        }

        #[test]
        fn advance_on_empty_initiative_fails() {
            let mut scene = Scene::new(TableId::new(), "Throne Room");
            assert_eq!(
                scene.advance_turn(Utc::now()),
                Err(InitiativeError::EmptyInitiative)
            );
        }
    }

    mod entries {
        use super::*;

        #[test]
        fn token_can_appear_only_once() {
            let mut scene = Scene::new(TableId::new(), "Throne Room");
            let token_id = TokenId::new();
            scene.add_entry("Goblin", Some(token_id), Utc::now()).unwrap();

            let err = scene
                .add_entry("Goblin again", Some(token_id), Utc::now())
                .unwrap_err();

            assert_eq!(err, InitiativeError::DuplicateEntry);
            assert_eq!(scene.initiative.len(), 1);
        }

        #[test]
        fn entries_without_tokens_may_repeat() {
            let mut scene = Scene::new(TableId::new(), "Throne Room");
            scene.add_entry("Lair action", None, Utc::now()).unwrap();
            scene.add_entry("Lair action", None, Utc::now()).unwrap();

            assert_eq!(scene.initiative.len(), 2);
        }

        #[test]
        fn remove_entry_returns_the_removed_row() {
            let (mut scene, ids) = scene_with_entries(&["Alice", "Goblin"]);

            let removed = scene.remove_entry(ids[0], Utc::now()).unwrap();

            assert_eq!(removed.name, "Alice");
            assert_eq!(scene.initiative.len(), 1);
            assert_eq!(
                scene.remove_entry(ids[0], Utc::now()),
                Err(InitiativeError::EntryNotFound)
            );
        }

        #[test]
        fn reorder_applies_the_permutation() {
            let (mut scene, ids) = scene_with_entries(&["Alice", "Goblin", "Wolf"]);

            scene
                .reorder_entries(&[ids[2], ids[0], ids[1]], Utc::now())
                .unwrap();

            let names: Vec<&str> = scene.initiative.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["Wolf", "Alice", "Goblin"]);
        }

        #[test]
        fn reorder_rejects_wrong_id_sets() {
            let (mut scene, ids) = scene_with_entries(&["Alice", "Goblin"]);

            // Missing an id.
            assert_eq!(
                scene.reorder_entries(&[ids[0]], Utc::now()),
                Err(InitiativeError::InvalidOrder)
            );
            // Unknown id.
            assert_eq!(
                scene.reorder_entries(&[ids[0], EntryId::new()], Utc::now()),
                Err(InitiativeError::InvalidOrder)
            );
            // Duplicated id.
            assert_eq!(
                scene.reorder_entries(&[ids[0], ids[0]], Utc::now()),
                Err(InitiativeError::InvalidOrder)
            );
            // Order unchanged after failed attempts.
            assert_eq!(scene.initiative.len(), 2);
            assert_eq!(scene.initiative[0].name, "Alice");
        }

        #[test]
        fn rename_entry_reports_linked_token() {
            let mut scene = Scene::new(TableId::new(), "Throne Room");
            let token_id = TokenId::new();
            let entry_id = scene
                .add_entry("Goblin", Some(token_id), Utc::now())
                .unwrap();

            let linked = scene.rename_entry(entry_id, "Hobgoblin", Utc::now()).unwrap();

            assert_eq!(linked, Some(token_id));
            assert_eq!(scene.initiative[0].name, "Hobgoblin");
        }

        #[test]
        fn reset_clears_entries_and_marker() {
            let (mut scene, _) = scene_with_entries(&["Alice", "Goblin"]);
            scene.advance_turn(Utc::now()).unwrap();

            scene.reset_initiative(Utc::now());

            assert!(scene.initiative.is_empty());
            assert!(scene.current_entry().is_none());
        }
    }
}
