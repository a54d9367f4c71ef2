//! The initiative order and the turn marker. Game master territory.

use std::sync::Arc;

use gridhall_domain::{
    EntryId, InitiativeEntry, Scene, SceneId, TableId, Token, TokenId, UserId,
};

use crate::infrastructure::overlay::OverlayStore;
use crate::infrastructure::ports::{ClockPort, SceneRepo, TableRepo, TokenRepo};
use crate::use_cases::ServiceError;

/// Where the turn marker landed, and what a round wrap swept along.
#[derive(Debug)]
pub struct TurnOutcome {
    pub entry_id: EntryId,
    pub new_round: bool,
    /// Tokens whose movement was restored; filled only on a wrap.
    pub movement_reset: Vec<TokenId>,
}

#[derive(Debug)]
pub struct RemovedEntry {
    pub entry: InitiativeEntry,
    /// Token deleted along with the entry, when asked for.
    pub removed_token: Option<TokenId>,
    /// True when the deleted token also had an aura to drop.
    pub removed_aura: bool,
}

pub struct RenamedEntry {
    pub entry: InitiativeEntry,
    /// Linked token, when the rename carried over to it.
    pub token: Option<Token>,
}

pub struct InitiativeOps {
    tables: Arc<dyn TableRepo>,
    scenes: Arc<dyn SceneRepo>,
    tokens: Arc<dyn TokenRepo>,
    overlays: Arc<dyn OverlayStore>,
    clock: Arc<dyn ClockPort>,
}

impl InitiativeOps {
    pub fn new(
        tables: Arc<dyn TableRepo>,
        scenes: Arc<dyn SceneRepo>,
        tokens: Arc<dyn TokenRepo>,
        overlays: Arc<dyn OverlayStore>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            tables,
            scenes,
            tokens,
            overlays,
            clock,
        }
    }

    /// Append an entry, optionally linked to a token of the same scene.
    pub async fn add_entry(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        name: &str,
        token_id: Option<TokenId>,
    ) -> Result<InitiativeEntry, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Entry name cannot be empty".into(),
            ));
        }
        let mut scene = self.scene_for_gm(user_id, table_id, scene_id).await?;
        if let Some(token_id) = token_id {
            let token = self
                .tokens
                .get(token_id)
                .await?
                .ok_or(ServiceError::NotFound("token"))?;
            if token.scene_id != scene_id {
                return Err(ServiceError::NotFound("token"));
            }
        }
        let entry_id = scene.add_entry(name, token_id, self.clock.now())?;
        let entry = scene
            .entry(entry_id)
            .cloned()
            .ok_or(ServiceError::NotFound("initiative entry"))?;
        self.scenes.save(&scene).await?;
        Ok(entry)
    }

    /// Move the marker to the next entry. A wrap back to the top starts a
    /// fresh round: every token's budget is restored and the live rulers on
    /// the table are swept.
    pub async fn next_turn(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<TurnOutcome, ServiceError> {
        let mut scene = self.scene_for_gm(user_id, table_id, scene_id).await?;
        let advance = scene.advance_turn(self.clock.now())?;
        self.scenes.save(&scene).await?;

        let mut movement_reset = Vec::new();
        if advance.new_round {
            let mut tokens = self.tokens.list_for_scene(scene_id).await?;
            for token in &mut tokens {
                token.reset_movement(self.clock.now());
                self.tokens.save(token).await?;
                movement_reset.push(token.id);
            }
            self.overlays.clear_ephemerals_for_table(table_id).await?;
        }

        Ok(TurnOutcome {
            entry_id: advance.entry_id,
            new_round: advance.new_round,
            movement_reset,
        })
    }

    /// Drop the whole order and its turn marker.
    pub async fn reset(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), ServiceError> {
        let mut scene = self.scene_for_gm(user_id, table_id, scene_id).await?;
        scene.reset_initiative(self.clock.now());
        self.scenes.save(&scene).await?;
        Ok(())
    }

    /// Remove one entry, optionally deleting its linked token (and with the
    /// token, its aura).
    pub async fn remove_entry(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        entry_id: EntryId,
        remove_token: bool,
    ) -> Result<RemovedEntry, ServiceError> {
        let mut scene = self.scene_for_gm(user_id, table_id, scene_id).await?;
        let entry = scene.remove_entry(entry_id, self.clock.now())?;
        self.scenes.save(&scene).await?;

        let mut removed_token = None;
        let mut removed_aura = false;
        if remove_token {
            if let Some(token_id) = entry.token_id {
                self.tokens.delete(token_id).await?;
                removed_aura = self
                    .overlays
                    .remove_aura(table_id, scene_id, token_id)
                    .await?;
                removed_token = Some(token_id);
            }
        }

        Ok(RemovedEntry {
            entry,
            removed_token,
            removed_aura,
        })
    }

    /// Apply a full permutation of the existing entries.
    pub async fn reorder(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        order: &[EntryId],
    ) -> Result<Vec<InitiativeEntry>, ServiceError> {
        let mut scene = self.scene_for_gm(user_id, table_id, scene_id).await?;
        scene.reorder_entries(order, self.clock.now())?;
        self.scenes.save(&scene).await?;
        Ok(scene.initiative)
    }

    /// Rename an entry; a linked token takes the new name too.
    pub async fn rename_entry(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        entry_id: EntryId,
        name: &str,
    ) -> Result<RenamedEntry, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Entry name cannot be empty".into(),
            ));
        }
        let mut scene = self.scene_for_gm(user_id, table_id, scene_id).await?;
        let linked = scene.rename_entry(entry_id, name, self.clock.now())?;
        let entry = scene
            .entry(entry_id)
            .cloned()
            .ok_or(ServiceError::NotFound("initiative entry"))?;
        self.scenes.save(&scene).await?;

        let token = match linked {
            Some(token_id) => match self.tokens.get(token_id).await? {
                Some(mut token) => {
                    token.name = name.to_string();
                    token.touch(self.clock.now());
                    self.tokens.save(&token).await?;
                    Some(token)
                }
                None => None,
            },
            None => None,
        };

        Ok(RenamedEntry { entry, token })
    }

    async fn scene_for_gm(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Scene, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master runs the initiative order",
            ));
        }
        let scene = self
            .scenes
            .get(scene_id)
            .await?
            .ok_or(ServiceError::NotFound("scene"))?;
        if scene.table_id != table_id {
            return Err(ServiceError::NotFound("scene"));
        }
        Ok(scene)
    }
}
