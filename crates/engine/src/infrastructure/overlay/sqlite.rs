//! SQLite overlay store.
//!
//! Backs overlay state with a shared database file so several engine
//! processes can serve the same tables. Ids are stored as uuid strings,
//! geometry as JSON, activity stamps as unix seconds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use gridhall_domain::{
    Aura, Measurement, PersistentMeasurement, SceneId, ShapeGeometry, TableId, TokenId, UserId,
};

use crate::infrastructure::overlay::{OverlayError, OverlayStore};
use crate::infrastructure::ports::ClockPort;

pub struct SqliteOverlayStore {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteOverlayStore {
    pub async fn new(db_path: &str, clock: Arc<dyn ClockPort>) -> Result<Self, OverlayError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| OverlayError::storage("connect", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS overlay_measurements (
                table_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                scene_id TEXT NOT NULL,
                geometry_json TEXT NOT NULL,
                color TEXT,
                PRIMARY KEY (table_id, user_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| OverlayError::storage("create_tables", e))?;

        // Reverse lookup for disconnect cleanup.
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_overlay_measurements_user
            ON overlay_measurements(user_id)
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| OverlayError::storage("create_tables", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS overlay_persistents (
                table_id TEXT NOT NULL,
                scene_id TEXT NOT NULL,
                id TEXT NOT NULL,
                created_by TEXT NOT NULL,
                geometry_json TEXT NOT NULL,
                color TEXT,
                PRIMARY KEY (table_id, scene_id, id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| OverlayError::storage("create_tables", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS overlay_auras (
                table_id TEXT NOT NULL,
                scene_id TEXT NOT NULL,
                token_id TEXT NOT NULL,
                created_by TEXT NOT NULL,
                radius_meters REAL NOT NULL,
                color TEXT,
                PRIMARY KEY (table_id, scene_id, token_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| OverlayError::storage("create_tables", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS overlay_activity (
                table_id TEXT PRIMARY KEY,
                last_activity INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| OverlayError::storage("create_tables", e))?;

        Ok(Self { pool, clock })
    }

    async fn stamp(&self, table_id: TableId) -> Result<(), OverlayError> {
        sqlx::query(
            r#"
            INSERT INTO overlay_activity (table_id, last_activity)
            VALUES (?, ?)
            ON CONFLICT(table_id) DO UPDATE SET last_activity = excluded.last_activity
            "#,
        )
        .bind(table_id.to_string())
        .bind(self.clock.now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("stamp_activity", e))?;
        Ok(())
    }

    async fn drop_table_rows(&self, table_id: &str) -> Result<(), OverlayError> {
        for table in [
            "overlay_measurements",
            "overlay_persistents",
            "overlay_auras",
            "overlay_activity",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE table_id = ?", table))
                .bind(table_id)
                .execute(&self.pool)
                .await
                .map_err(|e| OverlayError::storage("drop_table_rows", e))?;
        }
        Ok(())
    }
}

fn parse_id(operation: &'static str, value: &str) -> Result<Uuid, OverlayError> {
    Uuid::parse_str(value).map_err(|e| OverlayError::storage(operation, e))
}

fn parse_geometry(operation: &'static str, json: &str) -> Result<ShapeGeometry, OverlayError> {
    serde_json::from_str(json).map_err(|e| OverlayError::storage(operation, e))
}

fn geometry_json(operation: &'static str, geometry: &ShapeGeometry) -> Result<String, OverlayError> {
    serde_json::to_string(geometry).map_err(|e| OverlayError::storage(operation, e))
}

#[async_trait]
impl OverlayStore for SqliteOverlayStore {
    async fn set_measurement(
        &self,
        table_id: TableId,
        measurement: Measurement,
    ) -> Result<(), OverlayError> {
        sqlx::query(
            r#"
            INSERT INTO overlay_measurements (table_id, user_id, scene_id, geometry_json, color)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(table_id, user_id) DO UPDATE SET
                scene_id = excluded.scene_id,
                geometry_json = excluded.geometry_json,
                color = excluded.color
            "#,
        )
        .bind(table_id.to_string())
        .bind(measurement.user_id.to_string())
        .bind(measurement.scene_id.to_string())
        .bind(geometry_json("set_measurement", &measurement.geometry)?)
        .bind(&measurement.color)
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("set_measurement", e))?;
        self.stamp(table_id).await
    }

    async fn get_ephemeral(&self, table_id: TableId) -> Result<Vec<Measurement>, OverlayError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, scene_id, geometry_json, color
            FROM overlay_measurements
            WHERE table_id = ?
            ORDER BY user_id
            "#,
        )
        .bind(table_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("get_ephemeral", e))?;

        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id: String = row.get("user_id");
            let scene_id: String = row.get("scene_id");
            let geometry: String = row.get("geometry_json");
            let color: Option<String> = row.get("color");
            let mut measurement = Measurement::new(
                UserId::from_uuid(parse_id("get_ephemeral", &user_id)?),
                SceneId::from_uuid(parse_id("get_ephemeral", &scene_id)?),
                parse_geometry("get_ephemeral", &geometry)?,
            );
            measurement.color = color;
            all.push(measurement);
        }
        Ok(all)
    }

    async fn remove_measurement(
        &self,
        table_id: TableId,
        user_id: UserId,
    ) -> Result<bool, OverlayError> {
        let result = sqlx::query(
            "DELETE FROM overlay_measurements WHERE table_id = ? AND user_id = ?",
        )
        .bind(table_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("remove_measurement", e))?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.stamp(table_id).await?;
        }
        Ok(removed)
    }

    async fn tables_for_user(&self, user_id: UserId) -> Result<Vec<TableId>, OverlayError> {
        let rows = sqlx::query(
            "SELECT DISTINCT table_id FROM overlay_measurements WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("tables_for_user", e))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let table_id: String = row.get("table_id");
            tables.push(TableId::from_uuid(parse_id("tables_for_user", &table_id)?));
        }
        Ok(tables)
    }

    async fn clear_all_for_user(&self, user_id: UserId) -> Result<Vec<TableId>, OverlayError> {
        let tables = self.tables_for_user(user_id).await?;
        if tables.is_empty() {
            return Ok(tables);
        }

        sqlx::query("DELETE FROM overlay_measurements WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("clear_all_for_user", e))?;

        for table_id in &tables {
            self.stamp(*table_id).await?;
        }
        Ok(tables)
    }

    async fn clear_ephemerals_for_table(
        &self,
        table_id: TableId,
    ) -> Result<Vec<UserId>, OverlayError> {
        let rows = sqlx::query("SELECT user_id FROM overlay_measurements WHERE table_id = ?")
            .bind(table_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("clear_ephemerals_for_table", e))?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id: String = row.get("user_id");
            users.push(UserId::from_uuid(parse_id(
                "clear_ephemerals_for_table",
                &user_id,
            )?));
        }
        if users.is_empty() {
            return Ok(users);
        }

        sqlx::query("DELETE FROM overlay_measurements WHERE table_id = ?")
            .bind(table_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("clear_ephemerals_for_table", e))?;
        self.stamp(table_id).await?;
        Ok(users)
    }

    async fn add_persistent(
        &self,
        table_id: TableId,
        measurement: PersistentMeasurement,
    ) -> Result<(), OverlayError> {
        sqlx::query(
            r#"
            INSERT INTO overlay_persistents (table_id, scene_id, id, created_by, geometry_json, color)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(table_id, scene_id, id) DO UPDATE SET
                created_by = excluded.created_by,
                geometry_json = excluded.geometry_json,
                color = excluded.color
            "#,
        )
        .bind(table_id.to_string())
        .bind(measurement.scene_id.to_string())
        .bind(&measurement.id)
        .bind(measurement.created_by.to_string())
        .bind(geometry_json("add_persistent", &measurement.geometry)?)
        .bind(&measurement.color)
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("add_persistent", e))?;
        self.stamp(table_id).await
    }

    async fn remove_persistent(
        &self,
        table_id: TableId,
        scene_id: SceneId,
        id: &str,
    ) -> Result<bool, OverlayError> {
        let result = sqlx::query(
            "DELETE FROM overlay_persistents WHERE table_id = ? AND scene_id = ? AND id = ?",
        )
        .bind(table_id.to_string())
        .bind(scene_id.to_string())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("remove_persistent", e))?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.stamp(table_id).await?;
        }
        Ok(removed)
    }

    async fn list_persistents(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Vec<PersistentMeasurement>, OverlayError> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_by, geometry_json, color
            FROM overlay_persistents
            WHERE table_id = ? AND scene_id = ?
            ORDER BY id
            "#,
        )
        .bind(table_id.to_string())
        .bind(scene_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("list_persistents", e))?;

        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let created_by: String = row.get("created_by");
            let geometry: String = row.get("geometry_json");
            let color: Option<String> = row.get("color");
            let mut measurement = PersistentMeasurement::new(
                id,
                scene_id,
                UserId::from_uuid(parse_id("list_persistents", &created_by)?),
                parse_geometry("list_persistents", &geometry)?,
            );
            measurement.color = color;
            all.push(measurement);
        }
        Ok(all)
    }

    async fn clear_persistents_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError> {
        sqlx::query("DELETE FROM overlay_persistents WHERE table_id = ? AND scene_id = ?")
            .bind(table_id.to_string())
            .bind(scene_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("clear_persistents_for_scene", e))?;
        self.stamp(table_id).await
    }

    async fn upsert_aura(&self, table_id: TableId, aura: Aura) -> Result<(), OverlayError> {
        sqlx::query(
            r#"
            INSERT INTO overlay_auras (table_id, scene_id, token_id, created_by, radius_meters, color)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(table_id, scene_id, token_id) DO UPDATE SET
                created_by = excluded.created_by,
                radius_meters = excluded.radius_meters,
                color = excluded.color
            "#,
        )
        .bind(table_id.to_string())
        .bind(aura.scene_id.to_string())
        .bind(aura.token_id.to_string())
        .bind(aura.created_by.to_string())
        .bind(aura.radius_meters)
        .bind(&aura.color)
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("upsert_aura", e))?;
        self.stamp(table_id).await
    }

    async fn remove_aura(
        &self,
        table_id: TableId,
        scene_id: SceneId,
        token_id: TokenId,
    ) -> Result<bool, OverlayError> {
        let result = sqlx::query(
            "DELETE FROM overlay_auras WHERE table_id = ? AND scene_id = ? AND token_id = ?",
        )
        .bind(table_id.to_string())
        .bind(scene_id.to_string())
        .bind(token_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("remove_aura", e))?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.stamp(table_id).await?;
        }
        Ok(removed)
    }

    async fn list_auras(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Vec<Aura>, OverlayError> {
        let rows = sqlx::query(
            r#"
            SELECT token_id, created_by, radius_meters, color
            FROM overlay_auras
            WHERE table_id = ? AND scene_id = ?
            ORDER BY token_id
            "#,
        )
        .bind(table_id.to_string())
        .bind(scene_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OverlayError::storage("list_auras", e))?;

        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            let token_id: String = row.get("token_id");
            let created_by: String = row.get("created_by");
            let radius_meters: f64 = row.get("radius_meters");
            let color: Option<String> = row.get("color");
            let mut aura = Aura::new(
                TokenId::from_uuid(parse_id("list_auras", &token_id)?),
                scene_id,
                UserId::from_uuid(parse_id("list_auras", &created_by)?),
                radius_meters,
            );
            aura.color = color;
            all.push(aura);
        }
        Ok(all)
    }

    async fn clear_auras_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError> {
        sqlx::query("DELETE FROM overlay_auras WHERE table_id = ? AND scene_id = ?")
            .bind(table_id.to_string())
            .bind(scene_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("clear_auras_for_scene", e))?;
        self.stamp(table_id).await
    }

    async fn clear_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError> {
        for table in ["overlay_persistents", "overlay_auras", "overlay_measurements"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE table_id = ? AND scene_id = ?",
                table
            ))
            .bind(table_id.to_string())
            .bind(scene_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("clear_for_scene", e))?;
        }
        self.stamp(table_id).await
    }

    async fn clear_all_for_table(&self, table_id: TableId) -> Result<(), OverlayError> {
        self.drop_table_rows(&table_id.to_string()).await
    }

    async fn touch(&self, table_id: TableId) -> Result<(), OverlayError> {
        self.stamp(table_id).await
    }

    async fn cleanup_inactive_tables(&self, max_idle: Duration) -> Result<usize, OverlayError> {
        let cutoff = self.clock.now().timestamp() - max_idle.as_secs() as i64;
        let rows = sqlx::query("SELECT table_id FROM overlay_activity WHERE last_activity <= ?")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OverlayError::storage("cleanup_inactive_tables", e))?;

        for row in &rows {
            let table_id: String = row.get("table_id");
            self.drop_table_rows(&table_id).await?;
        }
        Ok(rows.len())
    }
}
