//! Joining a table and steering the live session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gridhall_domain::{
    Aura, Measurement, PersistentMeasurement, Scene, Table, TableId, TableStatus, Token, UserId,
};

use crate::infrastructure::overlay::OverlayStore;
use crate::infrastructure::ports::{ClockPort, SceneRepo, TableRepo, TokenRepo};
use crate::use_cases::ServiceError;

/// Shortest scene transition clients are asked to play, in milliseconds.
pub const TRANSITION_MIN_MS: u64 = 500;
/// Longest scene transition clients are asked to play, in milliseconds.
pub const TRANSITION_MAX_MS: u64 = 10_000;
/// Transition length used when the request names none.
pub const TRANSITION_DEFAULT_MS: u64 = 3_000;

/// Everything a freshly joined client needs to render the table.
#[derive(Debug)]
pub struct SessionSnapshot {
    pub table: Table,
    /// All scenes of the table, in display order.
    pub scenes: Vec<Scene>,
    /// Tokens of the active scene; empty when no scene is active.
    pub tokens: Vec<Token>,
    pub measurements: Vec<Measurement>,
    pub persistent_measurements: Vec<PersistentMeasurement>,
    pub auras: Vec<Aura>,
    /// True when this join added the user to the member list.
    pub newly_joined: bool,
}

pub struct SessionOps {
    tables: Arc<dyn TableRepo>,
    scenes: Arc<dyn SceneRepo>,
    tokens: Arc<dyn TokenRepo>,
    overlays: Arc<dyn OverlayStore>,
    clock: Arc<dyn ClockPort>,
}

impl SessionOps {
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

    /// Adds the user to the table on first contact and snapshots its state.
    pub async fn join(
        &self,
        user_id: UserId,
        table_id: TableId,
    ) -> Result<SessionSnapshot, ServiceError> {
        let mut table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;

        let newly_joined = table.add_member(user_id, self.clock.now());
        if newly_joined {
            self.tables.save(&table).await?;
        }

        let mut scenes = self.scenes.list_for_table(table_id).await?;
        scenes.sort_by_key(|scene| {
            table
                .scenes
                .iter()
                .position(|id| *id == scene.id)
                .unwrap_or(usize::MAX)
        });

        let (tokens, persistent_measurements, auras) = match table.active_scene {
            Some(active) => (
                self.tokens.list_for_scene(active).await?,
                self.overlays.list_persistents(table_id, active).await?,
                self.overlays.list_auras(table_id, active).await?,
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };
        let measurements = self.overlays.get_ephemeral(table_id).await?;
        self.overlays.touch(table_id).await?;

        Ok(SessionSnapshot {
            table,
            scenes,
            tokens,
            measurements,
            persistent_measurements,
            auras,
            newly_joined,
        })
    }

    /// Drive the session status machine. Game master only.
    pub async fn set_status(
        &self,
        user_id: UserId,
        table_id: TableId,
        next: TableStatus,
        paused_until: Option<DateTime<Utc>>,
    ) -> Result<Table, ServiceError> {
        let mut table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master can change the session status",
            ));
        }
        table.set_status(next, paused_until, self.clock.now())?;
        self.tables.save(&table).await?;
        Ok(table)
    }

    /// Clamp the requested transition length into the band clients can play.
    pub async fn start_transition(
        &self,
        user_id: UserId,
        table_id: TableId,
        duration_ms: Option<u64>,
    ) -> Result<u64, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_game_master(user_id) {
            return Err(ServiceError::Forbidden(
                "Only the game master can start a transition",
            ));
        }
        Ok(duration_ms
            .unwrap_or(TRANSITION_DEFAULT_MS)
            .clamp(TRANSITION_MIN_MS, TRANSITION_MAX_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gridhall_domain::{ShapeGeometry, MeasurementKind, Point, SquareId, TokenSize};

    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::memory::{MemorySceneRepo, MemoryTableRepo, MemoryTokenRepo};
    use crate::infrastructure::overlay::MemoryOverlayStore;

    struct Fixture {
        ops: SessionOps,
        tables: Arc<MemoryTableRepo>,
        scenes: Arc<MemorySceneRepo>,
        tokens: Arc<MemoryTokenRepo>,
        overlays: Arc<MemoryOverlayStore>,
        gm: UserId,
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn ClockPort> =
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 5, 4, 20, 0, 0).unwrap()));
        let tables = Arc::new(MemoryTableRepo::new());
        let scenes = Arc::new(MemorySceneRepo::new());
        let tokens = Arc::new(MemoryTokenRepo::new());
        let overlays = Arc::new(MemoryOverlayStore::new(clock.clone()));
        let ops = SessionOps::new(
            tables.clone(),
            scenes.clone(),
            tokens.clone(),
            overlays.clone(),
            clock,
        );
        Fixture {
            ops,
            tables,
            scenes,
            tokens,
            overlays,
            gm: UserId::new(),
        }
    }

    async fn seed_table(fx: &Fixture) -> Table {
        let table = Table::new("Ruins of Vel", fx.gm, "RUIN1234");
        fx.tables.save(&table).await.unwrap();
        table
    }

    async fn seed_scene(fx: &Fixture, table: &mut Table) -> Scene {
        let scene = Scene::new(table.id, "Courtyard");
        fx.scenes.save(&scene).await.unwrap();
        table.add_scene(scene.id, Utc::now());
        fx.tables.save(table).await.unwrap();
        scene
    }

    #[tokio::test]
    async fn join_adds_member_and_snapshots_the_table() {
        let fx = fixture();
        let mut table = seed_table(&fx).await;
        let scene = seed_scene(&fx, &mut table).await;

        let token = Token::new(
            table.id,
            scene.id,
            "Brynn",
            SquareId::new(4),
            TokenSize::Medium,
            9.0,
        );
        fx.tokens.save(&token).await.unwrap();

        let geometry = ShapeGeometry::new(
            MeasurementKind::Line,
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
        );
        fx.overlays
            .set_measurement(table.id, Measurement::new(fx.gm, scene.id, geometry.clone()))
            .await
            .unwrap();
        fx.overlays
            .add_persistent(
                table.id,
                PersistentMeasurement::new("zone-1", scene.id, fx.gm, geometry.clone()),
            )
            .await
            .unwrap();
        fx.overlays
            .upsert_aura(table.id, Aura::new(token.id, scene.id, fx.gm, 6.0))
            .await
            .unwrap();

        let player = UserId::new();
        let snapshot = fx.ops.join(player, table.id).await.unwrap();

        assert!(snapshot.newly_joined);
        assert!(snapshot.table.is_member(player));
        assert_eq!(snapshot.scenes.len(), 1);
        assert_eq!(snapshot.tokens.len(), 1);
        assert_eq!(snapshot.measurements.len(), 1);
        assert_eq!(snapshot.persistent_measurements.len(), 1);
        assert_eq!(snapshot.auras.len(), 1);

        // Membership survived the save.
        let stored = fx.tables.get(table.id).await.unwrap().unwrap();
        assert!(stored.is_member(player));
    }

    #[tokio::test]
    async fn rejoin_is_not_newly_joined() {
        let fx = fixture();
        let table = seed_table(&fx).await;
        let player = UserId::new();

        assert!(fx.ops.join(player, table.id).await.unwrap().newly_joined);
        assert!(!fx.ops.join(player, table.id).await.unwrap().newly_joined);
    }

    #[tokio::test]
    async fn join_unknown_table_fails() {
        let fx = fixture();
        let err = fx.ops.join(UserId::new(), TableId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("table")));
    }

    #[tokio::test]
    async fn scenes_come_back_in_display_order() {
        let fx = fixture();
        let mut table = seed_table(&fx).await;
        let first = seed_scene(&fx, &mut table).await;
        let second = seed_scene(&fx, &mut table).await;
        let mut table = fx.tables.get(table.id).await.unwrap().unwrap();
        table
            .reorder_scenes(&[second.id, first.id], Utc::now())
            .unwrap();
        fx.tables.save(&table).await.unwrap();

        let snapshot = fx.ops.join(fx.gm, table.id).await.unwrap();
        let order: Vec<_> = snapshot.scenes.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn status_machine_is_enforced() {
        let fx = fixture();
        let table = seed_table(&fx).await;

        let live = fx
            .ops
            .set_status(fx.gm, table.id, TableStatus::Live, None)
            .await
            .unwrap();
        assert_eq!(live.status, TableStatus::Live);

        let pause_end = Utc.with_ymd_and_hms(2024, 5, 4, 20, 30, 0).unwrap();
        let paused = fx
            .ops
            .set_status(fx.gm, table.id, TableStatus::Paused, Some(pause_end))
            .await
            .unwrap();
        assert_eq!(paused.status, TableStatus::Paused);
        assert_eq!(paused.paused_until, Some(pause_end));

        // Paused -> Preparing is not a legal edge.
        let err = fx
            .ops
            .set_status(fx.gm, table.id, TableStatus::Preparing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_the_gm_steers_the_session() {
        let fx = fixture();
        let table = seed_table(&fx).await;
        let player = UserId::new();
        fx.ops.join(player, table.id).await.unwrap();

        let err = fx
            .ops
            .set_status(player, table.id, TableStatus::Live, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = fx
            .ops
            .start_transition(player, table.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn transition_lengths_are_clamped() {
        let fx = fixture();
        let table = seed_table(&fx).await;

        let cases = [
            (None, TRANSITION_DEFAULT_MS),
            (Some(250), TRANSITION_MIN_MS),
            (Some(60_000), TRANSITION_MAX_MS),
            (Some(2_000), 2_000),
        ];
        for (requested, expected) in cases {
            let got = fx
                .ops
                .start_transition(fx.gm, table.id, requested)
                .await
                .unwrap();
            assert_eq!(got, expected, "requested {requested:?}");
        }
    }
}
