//! Live measurements, pinned zones, and token auras.
//!
//! The ephemeral kind lives one per user per table; pinned measurements and
//! auras stay until removed. Permission splits three ways: the game master
//! can do everything, the player on turn can draw, and token owners may
//! ring their own tokens.

use std::sync::Arc;

use gridhall_domain::{
    Aura, Measurement, PersistentMeasurement, Scene, SceneId, ShapeGeometry, Table, TableId,
    TokenId, UserId,
};

use crate::infrastructure::overlay::OverlayStore;
use crate::infrastructure::ports::{RandomPort, SceneRepo, TableRepo, TokenRepo};
use crate::use_cases::{permissions, ServiceError};

pub struct OverlayOps {
    tables: Arc<dyn TableRepo>,
    scenes: Arc<dyn SceneRepo>,
    tokens: Arc<dyn TokenRepo>,
    overlays: Arc<dyn OverlayStore>,
    random: Arc<dyn RandomPort>,
}

impl OverlayOps {
    pub fn new(
        tables: Arc<dyn TableRepo>,
        scenes: Arc<dyn SceneRepo>,
        tokens: Arc<dyn TokenRepo>,
        overlays: Arc<dyn OverlayStore>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            tables,
            scenes,
            tokens,
            overlays,
            random,
        }
    }

    /// Put up the user's live measurement, replacing any previous one.
    pub async fn share_measurement(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        geometry: ShapeGeometry,
        color: Option<String>,
    ) -> Result<Measurement, ServiceError> {
        validate_geometry(&geometry)?;
        let table = self.member_table(user_id, table_id).await?;
        let scene = self.scene_of(table_id, scene_id).await?;

        if !table.is_game_master(user_id) {
            if table.active_scene != Some(scene_id) {
                return Err(ServiceError::Forbidden(
                    "Measurements go on the active scene",
                ));
            }
            let scene_tokens = self.tokens.list_for_scene(scene_id).await?;
            let turn_owner = permissions::turn_owner(&scene, &scene_tokens);
            if !permissions::can_share_measurement(&table, turn_owner, user_id) {
                return Err(ServiceError::Forbidden(
                    "Only the game master or the player on turn can share measurements",
                ));
            }
        }

        let mut measurement = Measurement::new(user_id, scene_id, geometry);
        measurement.color = color;
        self.overlays
            .set_measurement(table_id, measurement.clone())
            .await?;
        Ok(measurement)
    }

    /// Take down the user's live measurement. Returns whether one was up.
    pub async fn remove_measurement(
        &self,
        user_id: UserId,
        table_id: TableId,
    ) -> Result<bool, ServiceError> {
        self.member_table(user_id, table_id).await?;
        Ok(self.overlays.remove_measurement(table_id, user_id).await?)
    }

    /// Pin a measurement to the scene. Game master only.
    pub async fn add_persistent(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        id: Option<String>,
        geometry: ShapeGeometry,
        color: Option<String>,
    ) -> Result<PersistentMeasurement, ServiceError> {
        validate_geometry(&geometry)?;
        self.gm_table(user_id, table_id, "Only the game master can pin measurements")
            .await?;
        self.scene_of(table_id, scene_id).await?;

        let id = match id.map(|s| s.trim().to_string()) {
            Some(s) if !s.is_empty() => s,
            _ => self.random.short_id(),
        };
        let mut measurement = PersistentMeasurement::new(id, scene_id, user_id, geometry);
        measurement.color = color;
        self.overlays
            .add_persistent(table_id, measurement.clone())
            .await?;
        Ok(measurement)
    }

    /// Unpin a measurement. Game master only.
    pub async fn remove_persistent(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        id: &str,
    ) -> Result<(), ServiceError> {
        self.gm_table(
            user_id,
            table_id,
            "Only the game master can remove pinned measurements",
        )
        .await?;
        if !self.overlays.remove_persistent(table_id, scene_id, id).await? {
            return Err(ServiceError::NotFound("measurement"));
        }
        Ok(())
    }

    /// Ring a token with an aura, replacing any existing one.
    pub async fn upsert_aura(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        token_id: TokenId,
        radius_meters: f64,
        color: Option<String>,
    ) -> Result<Aura, ServiceError> {
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(ServiceError::InvalidInput(
                "Aura radius must be a positive number".into(),
            ));
        }
        let table = self.member_table(user_id, table_id).await?;
        let scene = self.scene_of(table_id, scene_id).await?;
        let token = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(ServiceError::NotFound("token"))?;
        if token.scene_id != scene_id {
            return Err(ServiceError::NotFound("token"));
        }

        let scene_tokens = self.tokens.list_for_scene(scene_id).await?;
        let turn_owner = permissions::turn_owner(&scene, &scene_tokens);
        if !permissions::can_upsert_aura(&table, &token, turn_owner, user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master, the player on turn, or the token's owner can set auras",
            ));
        }

        let mut aura = Aura::new(token_id, scene_id, user_id, radius_meters);
        aura.color = color;
        self.overlays.upsert_aura(table_id, aura.clone()).await?;
        Ok(aura)
    }

    /// Drop a token's aura. Game master only.
    pub async fn remove_aura(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        token_id: TokenId,
    ) -> Result<(), ServiceError> {
        self.gm_table(user_id, table_id, "Only the game master can remove auras")
            .await?;
        if !self
            .overlays
            .remove_aura(table_id, scene_id, token_id)
            .await?
        {
            return Err(ServiceError::NotFound("aura"));
        }
        Ok(())
    }

    /// Wipe every measurement and aura on the table. Game master only.
    pub async fn clear_all(&self, user_id: UserId, table_id: TableId) -> Result<(), ServiceError> {
        self.gm_table(
            user_id,
            table_id,
            "Only the game master can clear all measurements",
        )
        .await?;
        self.overlays.clear_all_for_table(table_id).await?;
        Ok(())
    }

    /// Server-side sweep when a user's last connection goes away. Returns
    /// the tables whose rooms need to hear about it.
    pub async fn disconnect_cleanup(&self, user_id: UserId) -> Result<Vec<TableId>, ServiceError> {
        Ok(self.overlays.clear_all_for_user(user_id).await?)
    }

    async fn member_table(
        &self,
        user_id: UserId,
        table_id: TableId,
    ) -> Result<Table, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_member(user_id) {
            return Err(ServiceError::Forbidden("Not a member of this table"));
        }
        Ok(table)
    }

    async fn gm_table(
        &self,
        user_id: UserId,
        table_id: TableId,
        denial: &'static str,
    ) -> Result<Table, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(denial));
        }
        Ok(table)
    }

    async fn scene_of(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Scene, ServiceError> {
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

fn validate_geometry(geometry: &ShapeGeometry) -> Result<(), ServiceError> {
    let finite = |p: &gridhall_domain::Point| p.x.is_finite() && p.y.is_finite();
    if !finite(&geometry.origin) || !finite(&geometry.target) {
        return Err(ServiceError::InvalidInput(
            "Measurement coordinates must be finite numbers".into(),
        ));
    }
    Ok(())
}
