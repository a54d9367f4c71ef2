//! Placing, moving, and editing tokens on the grid.
//!
//! Spatial mutations run under the scene's lock so two clients cannot land
//! on the same squares by racing each other. The token read before taking
//! the lock only routes to the right lock; everything that matters is
//! re-read under it.

use std::sync::Arc;

use gridhall_domain::{
    collides, footprint_squares, movement_cost, CharacterId, InitiativeEntry, SceneId, SquareId,
    TableId, Token, TokenError, TokenId, TokenSize, UserId, DEFAULT_MOVEMENT_MAX,
};

use crate::infrastructure::ports::{CharacterRepo, ClockPort, SceneRepo, TableRepo, TokenRepo};
use crate::infrastructure::scene_locks::SceneLocks;
use crate::use_cases::{permissions, ServiceError};

/// Request to place a fresh token.
pub struct PlaceTokenInput {
    pub scene_id: SceneId,
    pub name: String,
    pub square: SquareId,
    pub size: TokenSize,
    pub color: Option<String>,
    pub image_asset: Option<String>,
    pub character_id: Option<CharacterId>,
    pub owner: Option<UserId>,
    pub can_overlap: bool,
    pub movement_max: Option<f64>,
    pub add_to_initiative: bool,
}

/// Patch for an existing token; absent fields stay as they are.
pub struct EditTokenInput {
    pub token_id: TokenId,
    pub name: Option<String>,
    pub color: Option<String>,
    pub image_asset: Option<String>,
    pub size: Option<TokenSize>,
    pub can_overlap: Option<bool>,
    pub movement_max: Option<f64>,
}

#[derive(Debug)]
pub struct PlacedToken {
    pub token: Token,
    /// Initiative entry created alongside, when asked for.
    pub entry: Option<InitiativeEntry>,
}

#[derive(Debug)]
pub struct MoveOutcome {
    pub token: Token,
    /// Square the token stood on before this move (or undo).
    pub from: SquareId,
}

#[derive(Debug)]
pub struct EditOutcome {
    pub token: Token,
    /// Linked initiative entry, when a rename carried over to it.
    pub renamed_entry: Option<InitiativeEntry>,
}

pub struct TokenOps {
    tables: Arc<dyn TableRepo>,
    scenes: Arc<dyn SceneRepo>,
    tokens: Arc<dyn TokenRepo>,
    characters: Arc<dyn CharacterRepo>,
    locks: Arc<SceneLocks>,
    clock: Arc<dyn ClockPort>,
}

impl TokenOps {
    pub fn new(
        tables: Arc<dyn TableRepo>,
        scenes: Arc<dyn SceneRepo>,
        tokens: Arc<dyn TokenRepo>,
        characters: Arc<dyn CharacterRepo>,
        locks: Arc<SceneLocks>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            tables,
            scenes,
            tokens,
            characters,
            locks,
            clock,
        }
    }

    /// Place a new token. Game master only.
    pub async fn place(
        &self,
        user_id: UserId,
        table_id: TableId,
        input: PlaceTokenInput,
    ) -> Result<PlacedToken, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Token name cannot be empty".into(),
            ));
        }
        if let Some(max) = input.movement_max {
            if !max.is_finite() || max < 0.0 {
                return Err(ServiceError::InvalidInput(
                    "Movement budget must be a non-negative number".into(),
                ));
            }
        }

        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master can place tokens",
            ));
        }

        let lock = self.locks.for_scene(input.scene_id);
        let _guard = lock.lock().await;

        let mut scene = self
            .scenes
            .get(input.scene_id)
            .await?
            .ok_or(ServiceError::NotFound("scene"))?;
        if scene.table_id != table_id {
            return Err(ServiceError::NotFound("scene"));
        }

        // A linked character lends the token its owner unless one is named.
        let owner = match input.character_id {
            Some(character_id) => {
                let character = self
                    .characters
                    .get(character_id)
                    .await?
                    .ok_or(ServiceError::NotFound("character"))?;
                if character.table_id != table_id {
                    return Err(ServiceError::InvalidInput(
                        "Character belongs to a different table".into(),
                    ));
                }
                input.owner.or(Some(character.owner))
            }
            None => input.owner,
        };

        let footprint =
            footprint_squares(input.square, input.size, scene.grid_width, scene.grid_height)?;
        if !input.can_overlap {
            let occupants = self.tokens.list_for_scene(scene.id).await?;
            if collides(
                &occupants,
                &footprint,
                scene.grid_width,
                scene.grid_height,
                None,
            ) {
                return Err(ServiceError::Conflict(
                    "Those squares are already occupied".into(),
                ));
            }
        }

        let mut token = Token::new(
            table_id,
            scene.id,
            name,
            input.square,
            input.size,
            input.movement_max.unwrap_or(DEFAULT_MOVEMENT_MAX),
        );
        token.color = input.color;
        token.image_asset = input.image_asset;
        token.character_id = input.character_id;
        token.owner = owner;
        token.can_overlap = input.can_overlap;
        self.tokens.save(&token).await?;

        let entry = if input.add_to_initiative {
            let entry_id = scene.add_entry(token.name.clone(), Some(token.id), self.clock.now())?;
            let entry = scene.entry(entry_id).cloned();
            self.scenes.save(&scene).await?;
            entry
        } else {
            None
        };

        Ok(PlacedToken { token, entry })
    }

    /// Move a token, spending movement for the Chebyshev distance covered.
    pub async fn move_token(
        &self,
        user_id: UserId,
        table_id: TableId,
        token_id: TokenId,
        target: SquareId,
    ) -> Result<MoveOutcome, ServiceError> {
        let routed = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        if routed.table_id != table_id {
            return Err(ServiceError::NotFound("token"));
        }
        let lock = self.locks.for_scene(routed.scene_id);
        let _guard = lock.lock().await;

        let mut token = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        let scene = self
            .scenes
            .get(token.scene_id)
            .await?
            .ok_or(ServiceError::NotFound("scene"))?;
        if !permissions::can_move_token(&table, &scene, &token, user_id) {
            return Err(ServiceError::Forbidden(
                "You may only move your own token, on its turn",
            ));
        }

        let footprint =
            footprint_squares(target, token.size, scene.grid_width, scene.grid_height)?;
        if !token.can_overlap {
            let occupants = self.tokens.list_for_scene(scene.id).await?;
            if collides(
                &occupants,
                &footprint,
                scene.grid_width,
                scene.grid_height,
                Some(token.id),
            ) {
                return Err(ServiceError::Conflict(
                    "Those squares are already occupied".into(),
                ));
            }
        }

        let cost = movement_cost(token.square, target, scene.grid_width, scene.meters_per_square);
        let from = token.square;
        token.apply_move(target, cost, self.clock.now())?;
        self.tokens.save(&token).await?;
        Ok(MoveOutcome { token, from })
    }

    /// Step the token back to where it last stood, refunding the cost.
    pub async fn undo_move(
        &self,
        user_id: UserId,
        table_id: TableId,
        token_id: TokenId,
    ) -> Result<MoveOutcome, ServiceError> {
        let routed = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        if routed.table_id != table_id {
            return Err(ServiceError::NotFound("token"));
        }
        let lock = self.locks.for_scene(routed.scene_id);
        let _guard = lock.lock().await;

        let mut token = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        let scene = self
            .scenes
            .get(token.scene_id)
            .await?
            .ok_or(ServiceError::NotFound("scene"))?;
        if !permissions::can_move_token(&table, &scene, &token, user_id) {
            return Err(ServiceError::Forbidden(
                "You may only move your own token, on its turn",
            ));
        }

        let Some(&previous) = token.move_history.last() else {
            return Err(TokenError::NoHistory.into());
        };
        // Undoing is a move too: someone may have taken the vacated squares,
        // or a resize may have cut them off.
        let footprint =
            footprint_squares(previous, token.size, scene.grid_width, scene.grid_height)?;
        if !token.can_overlap {
            let occupants = self.tokens.list_for_scene(scene.id).await?;
            if collides(
                &occupants,
                &footprint,
                scene.grid_width,
                scene.grid_height,
                Some(token.id),
            ) {
                return Err(ServiceError::Conflict(
                    "The vacated squares are occupied again".into(),
                ));
            }
        }

        let refund =
            movement_cost(token.square, previous, scene.grid_width, scene.meters_per_square);
        let from = token.square;
        token.undo_move(refund, self.clock.now())?;
        self.tokens.save(&token).await?;
        Ok(MoveOutcome { token, from })
    }

    /// Patch a token's presentation and budget. Game master only.
    pub async fn edit(
        &self,
        user_id: UserId,
        table_id: TableId,
        input: EditTokenInput,
    ) -> Result<EditOutcome, ServiceError> {
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::InvalidInput(
                    "Token name cannot be empty".into(),
                ));
            }
        }
        if let Some(max) = input.movement_max {
            if !max.is_finite() || max < 0.0 {
                return Err(ServiceError::InvalidInput(
                    "Movement budget must be a non-negative number".into(),
                ));
            }
        }

        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master can edit tokens",
            ));
        }

        let routed = self
            .tokens
            .get(input.token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        if routed.table_id != table_id {
            return Err(ServiceError::NotFound("token"));
        }
        let lock = self.locks.for_scene(routed.scene_id);
        let _guard = lock.lock().await;

        let mut token = self
            .tokens
            .get(input.token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        let scene = self
            .scenes
            .get(token.scene_id)
            .await?
            .ok_or(ServiceError::NotFound("scene"))?;

        let can_overlap = input.can_overlap.unwrap_or(token.can_overlap);
        if let Some(size) = input.size {
            // A grown footprint must still fit and not land on anyone.
            let footprint =
                footprint_squares(token.square, size, scene.grid_width, scene.grid_height)?;
            if !can_overlap {
                let occupants = self.tokens.list_for_scene(scene.id).await?;
                if collides(
                    &occupants,
                    &footprint,
                    scene.grid_width,
                    scene.grid_height,
                    Some(token.id),
                ) {
                    return Err(ServiceError::Conflict(
                        "Those squares are already occupied".into(),
                    ));
                }
            }
            token.size = size;
        }
        token.can_overlap = can_overlap;

        let renamed = match &input.name {
            Some(name) => {
                let trimmed = name.trim();
                let changed = trimmed != token.name;
                token.name = trimmed.to_string();
                changed
            }
            None => false,
        };
        if let Some(color) = input.color {
            token.color = Some(color);
        }
        if let Some(asset) = input.image_asset {
            token.image_asset = Some(asset);
        }
        if let Some(max) = input.movement_max {
            token.movement_max = max;
            token.movement_left = token.movement_left.min(max);
        }
        token.touch(self.clock.now());
        self.tokens.save(&token).await?;

        let renamed_entry = if renamed {
            self.sync_entry_name(&token).await?
        } else {
            None
        };

        Ok(EditOutcome {
            token,
            renamed_entry,
        })
    }

    /// Hand a token to another member, or back to the game master's pool.
    pub async fn assign(
        &self,
        user_id: UserId,
        table_id: TableId,
        token_id: TokenId,
        new_owner: Option<UserId>,
    ) -> Result<Token, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master can assign tokens",
            ));
        }

        let mut token = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        if token.table_id != table_id {
            return Err(ServiceError::NotFound("token"));
        }
        if let Some(owner) = new_owner {
            if !table.is_member(owner) {
                return Err(ServiceError::InvalidInput(
                    "New owner is not a member of this table".into(),
                ));
            }
        }
        token.owner = new_owner;
        token.touch(self.clock.now());
        self.tokens.save(&token).await?;
        Ok(token)
    }

    /// Rename the initiative entry linked to the token, if there is one.
    async fn sync_entry_name(
        &self,
        token: &Token,
    ) -> Result<Option<InitiativeEntry>, ServiceError> {
        let Some(mut scene) = self.scenes.get(token.scene_id).await? else {
            return Ok(None);
        };
        let Some(entry_id) = scene
            .initiative
            .iter()
            .find(|e| e.token_id == Some(token.id))
            .map(|e| e.id)
        else {
            return Ok(None);
        };
        scene.rename_entry(entry_id, token.name.clone(), self.clock.now())?;
        let entry = scene.entry(entry_id).cloned();
        self.scenes.save(&scene).await?;
        Ok(entry)
    }
}
