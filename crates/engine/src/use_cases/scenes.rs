//! Scene lifecycle: creating, switching, and shaping battle maps.
//!
//! All of it is game master territory. Deleting a scene cascades to its
//! tokens and overlay state; when the deleted scene was on stage, the table
//! falls back to the first remaining one and callers get the full payload
//! of the new active scene to broadcast.

use std::sync::Arc;

use gridhall_domain::{
    footprint_squares, Aura, PersistentMeasurement, Scene, SceneId, Table, TableId, Token,
    TokenId, UserId,
};

use crate::infrastructure::overlay::OverlayStore;
use crate::infrastructure::ports::{ClockPort, SceneRepo, TableRepo, TokenRepo};
use crate::infrastructure::scene_locks::SceneLocks;
use crate::use_cases::ServiceError;

/// Everything a client needs to render a scene that just came on stage.
#[derive(Debug)]
pub struct SceneSwitch {
    pub scene: Scene,
    pub tokens: Vec<Token>,
    pub persistent_measurements: Vec<PersistentMeasurement>,
    pub auras: Vec<Aura>,
}

#[derive(Debug)]
pub struct CreatedScene {
    pub scene: Scene,
    /// True when this was the table's first scene and went straight on stage.
    pub became_active: bool,
}

pub struct DeletedScene {
    pub removed_tokens: Vec<TokenId>,
    pub active_scene: Option<SceneId>,
    /// Payload of the scene now on stage, when the deletion put one there.
    pub switched_to: Option<SceneSwitch>,
}

pub struct SceneOps {
    tables: Arc<dyn TableRepo>,
    scenes: Arc<dyn SceneRepo>,
    tokens: Arc<dyn TokenRepo>,
    overlays: Arc<dyn OverlayStore>,
    locks: Arc<SceneLocks>,
    clock: Arc<dyn ClockPort>,
}

impl SceneOps {
    pub fn new(
        tables: Arc<dyn TableRepo>,
        scenes: Arc<dyn SceneRepo>,
        tokens: Arc<dyn TokenRepo>,
        overlays: Arc<dyn OverlayStore>,
        locks: Arc<SceneLocks>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            tables,
            scenes,
            tokens,
            overlays,
            locks,
            clock,
        }
    }

    pub async fn create(
        &self,
        user_id: UserId,
        table_id: TableId,
        name: &str,
        map_asset: Option<String>,
    ) -> Result<CreatedScene, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Scene name cannot be empty".into(),
            ));
        }
        let mut table = self.table_for_gm(user_id, table_id).await?;

        let mut scene = Scene::new(table_id, name);
        scene.map_asset = map_asset;
        self.scenes.save(&scene).await?;

        table.add_scene(scene.id, self.clock.now());
        let became_active = table.active_scene == Some(scene.id);
        self.tables.save(&table).await?;

        Ok(CreatedScene {
            scene,
            became_active,
        })
    }

    pub async fn rename(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        name: &str,
    ) -> Result<Scene, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Scene name cannot be empty".into(),
            ));
        }
        self.table_for_gm(user_id, table_id).await?;
        let mut scene = self.scene_of(table_id, scene_id).await?;
        scene.rename(name, self.clock.now());
        self.scenes.save(&scene).await?;
        Ok(scene)
    }

    pub async fn delete(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<DeletedScene, ServiceError> {
        let mut table = self.table_for_gm(user_id, table_id).await?;
        let was_active = table.active_scene == Some(scene_id);
        table.detach_scene(scene_id, self.clock.now())?;

        let removed_tokens = self.tokens.delete_for_scene(scene_id).await?;
        self.overlays.clear_for_scene(table_id, scene_id).await?;
        self.scenes.delete(scene_id).await?;
        self.tables.save(&table).await?;
        self.locks.remove(scene_id);

        let switched_to = match (was_active, table.active_scene) {
            (true, Some(next)) => Some(self.switch_payload(table_id, next).await?),
            _ => None,
        };

        Ok(DeletedScene {
            removed_tokens,
            active_scene: table.active_scene,
            switched_to,
        })
    }

    pub async fn set_active(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<SceneSwitch, ServiceError> {
        let mut table = self.table_for_gm(user_id, table_id).await?;
        table.set_active_scene(scene_id, self.clock.now())?;
        self.tables.save(&table).await?;
        self.switch_payload(table_id, scene_id).await
    }

    pub async fn set_map(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        map_asset: Option<String>,
    ) -> Result<Scene, ServiceError> {
        self.table_for_gm(user_id, table_id).await?;
        let mut scene = self.scene_of(table_id, scene_id).await?;
        scene.set_map(map_asset, self.clock.now());
        self.scenes.save(&scene).await?;
        Ok(scene)
    }

    pub async fn reorder(
        &self,
        user_id: UserId,
        table_id: TableId,
        order: &[SceneId],
    ) -> Result<Vec<SceneId>, ServiceError> {
        let mut table = self.table_for_gm(user_id, table_id).await?;
        table.reorder_scenes(order, self.clock.now())?;
        self.tables.save(&table).await?;
        Ok(table.scenes)
    }

    pub async fn set_grid_dimensions(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        width: u32,
        height: u32,
    ) -> Result<Scene, ServiceError> {
        self.table_for_gm(user_id, table_id).await?;
        let lock = self.locks.for_scene(scene_id);
        let _guard = lock.lock().await;

        let mut scene = self.scene_of(table_id, scene_id).await?;
        scene.set_grid_dimensions(width, height, self.clock.now())?;

        // Nothing is saved until every footprint still fits the new grid.
        let tokens = self.tokens.list_for_scene(scene_id).await?;
        for token in &tokens {
            if footprint_squares(token.square, token.size, width, height).is_err() {
                return Err(ServiceError::Conflict(
                    "Resizing would strand tokens outside the grid".into(),
                ));
            }
        }

        self.scenes.save(&scene).await?;
        Ok(scene)
    }

    pub async fn set_scale(
        &self,
        user_id: UserId,
        table_id: TableId,
        scene_id: SceneId,
        meters_per_square: f64,
    ) -> Result<Scene, ServiceError> {
        self.table_for_gm(user_id, table_id).await?;
        let mut scene = self.scene_of(table_id, scene_id).await?;
        scene.set_scale(meters_per_square, self.clock.now())?;
        self.scenes.save(&scene).await?;
        Ok(scene)
    }

    async fn switch_payload(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<SceneSwitch, ServiceError> {
        let scene = self
            .scenes
            .get(scene_id)
            .await?
            .ok_or(ServiceError::NotFound("scene"))?;
        Ok(SceneSwitch {
            tokens: self.tokens.list_for_scene(scene_id).await?,
            persistent_measurements: self.overlays.list_persistents(table_id, scene_id).await?,
            auras: self.overlays.list_auras(table_id, scene_id).await?,
            scene,
        })
    }

    async fn table_for_gm(
        &self,
        user_id: UserId,
        table_id: TableId,
    ) -> Result<Table, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master manages scenes",
            ));
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gridhall_domain::{
        MeasurementKind, Point, ShapeGeometry, SquareId, TokenSize,
    };

    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::memory::{MemorySceneRepo, MemoryTableRepo, MemoryTokenRepo};
    use crate::infrastructure::overlay::MemoryOverlayStore;
    use crate::infrastructure::ports::ClockPort;

    struct Fixture {
        ops: SceneOps,
        tables: Arc<MemoryTableRepo>,
        scenes: Arc<MemorySceneRepo>,
        tokens: Arc<MemoryTokenRepo>,
        overlays: Arc<MemoryOverlayStore>,
        gm: UserId,
    }

    async fn fixture() -> (Fixture, Table) {
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        let tables = Arc::new(MemoryTableRepo::new());
        let scenes = Arc::new(MemorySceneRepo::new());
        let tokens = Arc::new(MemoryTokenRepo::new());
        let overlays = Arc::new(MemoryOverlayStore::new(clock.clone()));
        let ops = SceneOps::new(
            tables.clone(),
            scenes.clone(),
            tokens.clone(),
            overlays.clone(),
            Arc::new(SceneLocks::new()),
            clock,
        );
        let fx = Fixture {
            ops,
            tables,
            scenes,
            tokens,
            overlays,
            gm: UserId::new(),
        };
        let table = Table::new("Ruins of Vel", fx.gm, "RUIN1234");
        fx.tables.save(&table).await.unwrap();
        (fx, table)
    }

    async fn seed_token(fx: &Fixture, table_id: TableId, scene_id: SceneId, square: u32) -> Token {
        let token = Token::new(
            table_id,
            scene_id,
            "Brynn",
            SquareId::new(square),
            TokenSize::Medium,
            9.0,
        );
        fx.tokens.save(&token).await.unwrap();
        token
    }

    fn ruler() -> ShapeGeometry {
        ShapeGeometry::new(
            MeasurementKind::Ruler,
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
        )
    }

    #[tokio::test]
    async fn the_first_scene_goes_straight_on_stage() {
        let (fx, table) = fixture().await;
        let first = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        assert!(first.became_active);

        let second = fx
            .ops
            .create(fx.gm, table.id, "Cellar", Some("cellar.png".into()))
            .await
            .unwrap();
        assert!(!second.became_active);
        assert_eq!(second.scene.map_asset.as_deref(), Some("cellar.png"));

        let stored = fx.tables.get(table.id).await.unwrap().unwrap();
        assert_eq!(stored.scenes, vec![first.scene.id, second.scene.id]);
        assert_eq!(stored.active_scene, Some(first.scene.id));
    }

    #[tokio::test]
    async fn scene_names_are_validated() {
        let (fx, table) = fixture().await;
        let err = fx
            .ops
            .create(fx.gm, table.id, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deleting_the_active_scene_switches_and_cascades() {
        let (fx, table) = fixture().await;
        let stage = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        let backdrop = fx
            .ops
            .create(fx.gm, table.id, "Cellar", None)
            .await
            .unwrap();

        let token = seed_token(&fx, table.id, stage.scene.id, 0).await;
        fx.overlays
            .add_persistent(
                table.id,
                PersistentMeasurement::new("zone-1", stage.scene.id, fx.gm, ruler()),
            )
            .await
            .unwrap();
        fx.overlays
            .upsert_aura(table.id, Aura::new(token.id, stage.scene.id, fx.gm, 6.0))
            .await
            .unwrap();

        let deleted = fx
            .ops
            .delete(fx.gm, table.id, stage.scene.id)
            .await
            .unwrap();

        assert_eq!(deleted.removed_tokens, vec![token.id]);
        assert_eq!(deleted.active_scene, Some(backdrop.scene.id));
        let switch = deleted.switched_to.unwrap();
        assert_eq!(switch.scene.id, backdrop.scene.id);
        assert!(switch.tokens.is_empty());

        assert!(fx.scenes.get(stage.scene.id).await.unwrap().is_none());
        assert!(fx
            .overlays
            .list_persistents(table.id, stage.scene.id)
            .await
            .unwrap()
            .is_empty());
        assert!(fx
            .overlays
            .list_auras(table.id, stage.scene.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_a_backdrop_leaves_the_stage_alone() {
        let (fx, table) = fixture().await;
        let stage = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        let backdrop = fx
            .ops
            .create(fx.gm, table.id, "Cellar", None)
            .await
            .unwrap();

        let deleted = fx
            .ops
            .delete(fx.gm, table.id, backdrop.scene.id)
            .await
            .unwrap();
        assert_eq!(deleted.active_scene, Some(stage.scene.id));
        assert!(deleted.switched_to.is_none());
    }

    #[tokio::test]
    async fn deleting_the_last_scene_clears_the_stage() {
        let (fx, table) = fixture().await;
        let only = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        let deleted = fx
            .ops
            .delete(fx.gm, table.id, only.scene.id)
            .await
            .unwrap();
        assert_eq!(deleted.active_scene, None);
        assert!(deleted.switched_to.is_none());
    }

    #[tokio::test]
    async fn switching_returns_the_full_payload() {
        let (fx, table) = fixture().await;
        fx.ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        let cellar = fx
            .ops
            .create(fx.gm, table.id, "Cellar", None)
            .await
            .unwrap();
        let token = seed_token(&fx, table.id, cellar.scene.id, 3).await;

        let switch = fx
            .ops
            .set_active(fx.gm, table.id, cellar.scene.id)
            .await
            .unwrap();
        assert_eq!(switch.scene.id, cellar.scene.id);
        assert_eq!(switch.tokens.len(), 1);
        assert_eq!(switch.tokens[0].id, token.id);

        let stored = fx.tables.get(table.id).await.unwrap().unwrap();
        assert_eq!(stored.active_scene, Some(cellar.scene.id));
    }

    #[tokio::test]
    async fn switching_to_an_unattached_scene_fails() {
        let (fx, table) = fixture().await;
        fx.ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        let err = fx
            .ops
            .set_active(fx.gm, table.id, SceneId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("scene")));
    }

    #[tokio::test]
    async fn reorder_must_cover_every_scene() {
        let (fx, table) = fixture().await;
        let a = fx
            .ops
            .create(fx.gm, table.id, "A", None)
            .await
            .unwrap();
        let b = fx
            .ops
            .create(fx.gm, table.id, "B", None)
            .await
            .unwrap();

        let order = fx
            .ops
            .reorder(fx.gm, table.id, &[b.scene.id, a.scene.id])
            .await
            .unwrap();
        assert_eq!(order, vec![b.scene.id, a.scene.id]);

        let err = fx
            .ops
            .reorder(fx.gm, table.id, &[a.scene.id])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn resizing_checks_token_footprints() {
        let (fx, table) = fixture().await;
        let created = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        // Near the origin this square survives any reasonable resize; the far
        // one only exists while the grid stays large.
        seed_token(&fx, table.id, created.scene.id, 5).await;
        seed_token(&fx, table.id, created.scene.id, 850).await;

        let err = fx
            .ops
            .set_grid_dimensions(fx.gm, table.id, created.scene.id, 10, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        // Nothing was persisted.
        let stored = fx.scenes.get(created.scene.id).await.unwrap().unwrap();
        assert_eq!(stored.grid_width, 30);

        let resized = fx
            .ops
            .set_grid_dimensions(fx.gm, table.id, created.scene.id, 40, 40)
            .await
            .unwrap();
        assert_eq!(resized.grid_width, 40);
    }

    #[tokio::test]
    async fn zero_dimensions_are_invalid() {
        let (fx, table) = fixture().await;
        let created = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();
        let err = fx
            .ops
            .set_grid_dimensions(fx.gm, table.id, created.scene.id, 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn scale_is_validated() {
        let (fx, table) = fixture().await;
        let created = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();

        let err = fx
            .ops
            .set_scale(fx.gm, table.id, created.scene.id, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let scene = fx
            .ops
            .set_scale(fx.gm, table.id, created.scene.id, 2.0)
            .await
            .unwrap();
        assert!((scene.meters_per_square - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn map_art_can_be_swapped_and_cleared() {
        let (fx, table) = fixture().await;
        let created = fx
            .ops
            .create(fx.gm, table.id, "Courtyard", None)
            .await
            .unwrap();

        let scene = fx
            .ops
            .set_map(fx.gm, table.id, created.scene.id, Some("yard.png".into()))
            .await
            .unwrap();
        assert_eq!(scene.map_asset.as_deref(), Some("yard.png"));

        let scene = fx
            .ops
            .set_map(fx.gm, table.id, created.scene.id, None)
            .await
            .unwrap();
        assert_eq!(scene.map_asset, None);
    }

    #[tokio::test]
    async fn scene_management_is_gm_only() {
        let (fx, mut table) = fixture().await;
        let player = UserId::new();
        table.add_member(player, Utc::now());
        fx.tables.save(&table).await.unwrap();

        let err = fx
            .ops
            .create(player, table.id, "Courtyard", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
