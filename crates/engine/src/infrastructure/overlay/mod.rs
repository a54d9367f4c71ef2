//! Overlay storage: live measurements, pinned measurements and auras.
//!
//! Overlay state is deliberately separate from the document store - it is
//! high-churn, low-value data that tables redraw constantly. One trait, two
//! backends: in-process maps, or a shared SQLite database when several engine
//! processes serve the same tables. The backend is chosen once at startup;
//! call sites hold `Arc<dyn OverlayStore>` and never branch on which one runs.

mod memory;
mod sqlite;

pub use memory::MemoryOverlayStore;
pub use sqlite::SqliteOverlayStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use gridhall_domain::{Aura, Measurement, PersistentMeasurement, SceneId, TableId, TokenId, UserId};

use crate::config::{AppSettings, OverlayBackendKind};
use crate::infrastructure::ports::ClockPort;

/// Overlay storage operation errors.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay storage error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl OverlayError {
    pub fn storage(operation: &'static str, message: impl ToString) -> Self {
        Self::Storage {
            operation,
            message: message.to_string(),
        }
    }
}

/// Storage contract shared by every overlay backend.
///
/// Mutating operations stamp the table's activity themselves; `touch` exists
/// for activity that changes nothing (joins, heartbeats on a quiet table).
/// Both backends keep identical visible semantics so the conformance suite
/// below runs against each.
#[async_trait]
pub trait OverlayStore: Send + Sync {
    // ===== Ephemeral measurements, one per (table, user) =====

    /// Set or replace the user's live measurement on a table.
    async fn set_measurement(
        &self,
        table_id: TableId,
        measurement: Measurement,
    ) -> Result<(), OverlayError>;

    /// Every live measurement currently on the table.
    async fn get_ephemeral(&self, table_id: TableId) -> Result<Vec<Measurement>, OverlayError>;

    /// Withdraw the user's live measurement. Returns whether one existed.
    async fn remove_measurement(
        &self,
        table_id: TableId,
        user_id: UserId,
    ) -> Result<bool, OverlayError>;

    /// Tables on which the user currently has a live measurement. Backed by a
    /// reverse index so disconnect cleanup is O(subscriptions), not O(tables).
    async fn tables_for_user(&self, user_id: UserId) -> Result<Vec<TableId>, OverlayError>;

    /// Drop the user's live measurements everywhere, returning the tables
    /// that actually held one.
    async fn clear_all_for_user(&self, user_id: UserId) -> Result<Vec<TableId>, OverlayError>;

    /// Drop every live measurement on the table, returning whose they were.
    /// Pinned measurements and auras are untouched; this is the round-wrap
    /// sweep.
    async fn clear_ephemerals_for_table(
        &self,
        table_id: TableId,
    ) -> Result<Vec<UserId>, OverlayError>;

    // ===== Pinned measurements, per (table, scene, id) =====

    async fn add_persistent(
        &self,
        table_id: TableId,
        measurement: PersistentMeasurement,
    ) -> Result<(), OverlayError>;

    /// Returns whether the measurement existed.
    async fn remove_persistent(
        &self,
        table_id: TableId,
        scene_id: SceneId,
        id: &str,
    ) -> Result<bool, OverlayError>;

    /// Pinned measurements on a scene, ordered by id.
    async fn list_persistents(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Vec<PersistentMeasurement>, OverlayError>;

    async fn clear_persistents_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError>;

    // ===== Auras, one per (table, scene, token) =====

    async fn upsert_aura(&self, table_id: TableId, aura: Aura) -> Result<(), OverlayError>;

    /// Returns whether the aura existed.
    async fn remove_aura(
        &self,
        table_id: TableId,
        scene_id: SceneId,
        token_id: TokenId,
    ) -> Result<bool, OverlayError>;

    async fn list_auras(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Vec<Aura>, OverlayError>;

    async fn clear_auras_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError>;

    // ===== Scoped wipes =====

    /// Drop everything pointing at one scene: its pinned measurements, its
    /// auras, and any live measurement drawn on it.
    async fn clear_for_scene(&self, table_id: TableId, scene_id: SceneId)
        -> Result<(), OverlayError>;

    /// Drop all overlay state for a table.
    async fn clear_all_for_table(&self, table_id: TableId) -> Result<(), OverlayError>;

    // ===== Activity stamping and the idle reaper =====

    /// Record activity on a table without changing overlay state.
    async fn touch(&self, table_id: TableId) -> Result<(), OverlayError>;

    /// Drop all overlay state for tables idle longer than `max_idle`.
    /// Returns how many tables were swept.
    async fn cleanup_inactive_tables(&self, max_idle: Duration) -> Result<usize, OverlayError>;
}

/// Build the overlay store the configuration asks for.
pub async fn build_overlay_store(
    settings: &AppSettings,
    clock: Arc<dyn ClockPort>,
) -> Result<Arc<dyn OverlayStore>, OverlayError> {
    match settings.overlay_backend {
        OverlayBackendKind::Memory => Ok(Arc::new(MemoryOverlayStore::new(clock))),
        OverlayBackendKind::Sqlite => {
            let store = SqliteOverlayStore::new(&settings.overlay_db, clock).await?;
            Ok(Arc::new(store))
        }
    }
}
