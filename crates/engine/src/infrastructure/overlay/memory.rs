//! In-process overlay store.
//!
//! Everything lives in nested maps behind one `RwLock`; the single lock keeps
//! the user reverse index consistent with the measurements it points at.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gridhall_domain::{Aura, Measurement, PersistentMeasurement, SceneId, TableId, TokenId, UserId};

use crate::infrastructure::overlay::{OverlayError, OverlayStore};
use crate::infrastructure::ports::ClockPort;

#[derive(Default)]
struct OverlayState {
    /// table -> user -> live measurement
    measurements: HashMap<TableId, HashMap<UserId, Measurement>>,
    /// table -> scene -> measurement id -> pinned measurement
    persistents: HashMap<TableId, HashMap<SceneId, HashMap<String, PersistentMeasurement>>>,
    /// table -> scene -> token -> aura
    auras: HashMap<TableId, HashMap<SceneId, HashMap<TokenId, Aura>>>,
    /// Reverse index over `measurements` for disconnect cleanup.
    user_tables: HashMap<UserId, HashSet<TableId>>,
    /// Last activity stamp per table, for the idle reaper.
    activity: HashMap<TableId, DateTime<Utc>>,
}

impl OverlayState {
    fn stamp(&mut self, table_id: TableId, now: DateTime<Utc>) {
        self.activity.insert(table_id, now);
    }

    fn unindex_user(&mut self, user_id: UserId, table_id: TableId) {
        if let Some(tables) = self.user_tables.get_mut(&user_id) {
            tables.remove(&table_id);
            if tables.is_empty() {
                self.user_tables.remove(&user_id);
            }
        }
    }

    fn drop_table(&mut self, table_id: TableId) {
        if let Some(by_user) = self.measurements.remove(&table_id) {
            for user_id in by_user.keys() {
                self.unindex_user(*user_id, table_id);
            }
        }
        self.persistents.remove(&table_id);
        self.auras.remove(&table_id);
        self.activity.remove(&table_id);
    }
}

pub struct MemoryOverlayStore {
    clock: Arc<dyn ClockPort>,
    state: RwLock<OverlayState>,
}

impl MemoryOverlayStore {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            clock,
            state: RwLock::new(OverlayState::default()),
        }
    }
}

#[async_trait]
impl OverlayStore for MemoryOverlayStore {
    async fn set_measurement(
        &self,
        table_id: TableId,
        measurement: Measurement,
    ) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let user_id = measurement.user_id;
        state
            .measurements
            .entry(table_id)
            .or_default()
            .insert(user_id, measurement);
        state.user_tables.entry(user_id).or_default().insert(table_id);
        state.stamp(table_id, now);
        Ok(())
    }

    async fn get_ephemeral(&self, table_id: TableId) -> Result<Vec<Measurement>, OverlayError> {
        let state = self.state.read().await;
        let mut all: Vec<Measurement> = state
            .measurements
            .get(&table_id)
            .map(|by_user| by_user.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|m| m.user_id.to_string());
        Ok(all)
    }

    async fn remove_measurement(
        &self,
        table_id: TableId,
        user_id: UserId,
    ) -> Result<bool, OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let removed = state
            .measurements
            .get_mut(&table_id)
            .and_then(|by_user| by_user.remove(&user_id))
            .is_some();
        if removed {
            state.unindex_user(user_id, table_id);
            state.stamp(table_id, now);
        }
        Ok(removed)
    }

    async fn tables_for_user(&self, user_id: UserId) -> Result<Vec<TableId>, OverlayError> {
        let state = self.state.read().await;
        Ok(state
            .user_tables
            .get(&user_id)
            .map(|tables| tables.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn clear_all_for_user(&self, user_id: UserId) -> Result<Vec<TableId>, OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let tables: Vec<TableId> = state
            .user_tables
            .remove(&user_id)
            .map(|tables| tables.into_iter().collect())
            .unwrap_or_default();
        for table_id in &tables {
            if let Some(by_user) = state.measurements.get_mut(table_id) {
                by_user.remove(&user_id);
            }
            state.stamp(*table_id, now);
        }
        Ok(tables)
    }

    async fn clear_ephemerals_for_table(
        &self,
        table_id: TableId,
    ) -> Result<Vec<UserId>, OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let users: Vec<UserId> = state
            .measurements
            .remove(&table_id)
            .map(|by_user| by_user.into_keys().collect())
            .unwrap_or_default();
        for user_id in &users {
            state.unindex_user(*user_id, table_id);
        }
        if !users.is_empty() {
            state.stamp(table_id, now);
        }
        Ok(users)
    }

    async fn add_persistent(
        &self,
        table_id: TableId,
        measurement: PersistentMeasurement,
    ) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state
            .persistents
            .entry(table_id)
            .or_default()
            .entry(measurement.scene_id)
            .or_default()
            .insert(measurement.id.clone(), measurement);
        state.stamp(table_id, now);
        Ok(())
    }

    async fn remove_persistent(
        &self,
        table_id: TableId,
        scene_id: SceneId,
        id: &str,
    ) -> Result<bool, OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let removed = state
            .persistents
            .get_mut(&table_id)
            .and_then(|by_scene| by_scene.get_mut(&scene_id))
            .and_then(|by_id| by_id.remove(id))
            .is_some();
        if removed {
            state.stamp(table_id, now);
        }
        Ok(removed)
    }

    async fn list_persistents(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Vec<PersistentMeasurement>, OverlayError> {
        let state = self.state.read().await;
        let mut all: Vec<PersistentMeasurement> = state
            .persistents
            .get(&table_id)
            .and_then(|by_scene| by_scene.get(&scene_id))
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn clear_persistents_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if let Some(by_scene) = state.persistents.get_mut(&table_id) {
            by_scene.remove(&scene_id);
        }
        state.stamp(table_id, now);
        Ok(())
    }

    async fn upsert_aura(&self, table_id: TableId, aura: Aura) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state
            .auras
            .entry(table_id)
            .or_default()
            .entry(aura.scene_id)
            .or_default()
            .insert(aura.token_id, aura);
        state.stamp(table_id, now);
        Ok(())
    }

    async fn remove_aura(
        &self,
        table_id: TableId,
        scene_id: SceneId,
        token_id: TokenId,
    ) -> Result<bool, OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let removed = state
            .auras
            .get_mut(&table_id)
            .and_then(|by_scene| by_scene.get_mut(&scene_id))
            .and_then(|by_token| by_token.remove(&token_id))
            .is_some();
        if removed {
            state.stamp(table_id, now);
        }
        Ok(removed)
    }

    async fn list_auras(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<Vec<Aura>, OverlayError> {
        let state = self.state.read().await;
        let mut all: Vec<Aura> = state
            .auras
            .get(&table_id)
            .and_then(|by_scene| by_scene.get(&scene_id))
            .map(|by_token| by_token.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|a| a.token_id.to_string());
        Ok(all)
    }

    async fn clear_auras_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if let Some(by_scene) = state.auras.get_mut(&table_id) {
            by_scene.remove(&scene_id);
        }
        state.stamp(table_id, now);
        Ok(())
    }

    async fn clear_for_scene(
        &self,
        table_id: TableId,
        scene_id: SceneId,
    ) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if let Some(by_scene) = state.persistents.get_mut(&table_id) {
            by_scene.remove(&scene_id);
        }
        if let Some(by_scene) = state.auras.get_mut(&table_id) {
            by_scene.remove(&scene_id);
        }
        let stale: Vec<UserId> = state
            .measurements
            .get(&table_id)
            .map(|by_user| {
                by_user
                    .iter()
                    .filter(|(_, m)| m.scene_id == scene_id)
                    .map(|(user_id, _)| *user_id)
                    .collect()
            })
            .unwrap_or_default();
        for user_id in stale {
            if let Some(by_user) = state.measurements.get_mut(&table_id) {
                by_user.remove(&user_id);
            }
            state.unindex_user(user_id, table_id);
        }
        state.stamp(table_id, now);
        Ok(())
    }

    async fn clear_all_for_table(&self, table_id: TableId) -> Result<(), OverlayError> {
        let mut state = self.state.write().await;
        state.drop_table(table_id);
        Ok(())
    }

    async fn touch(&self, table_id: TableId) -> Result<(), OverlayError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.stamp(table_id, now);
        Ok(())
    }

    async fn cleanup_inactive_tables(&self, max_idle: Duration) -> Result<usize, OverlayError> {
        let cutoff = self.clock.now()
            - chrono::Duration::from_std(max_idle)
                .map_err(|e| OverlayError::storage("cleanup_inactive_tables", e))?;
        let mut state = self.state.write().await;
        let idle: Vec<TableId> = state
            .activity
            .iter()
            .filter(|(_, stamp)| **stamp <= cutoff)
            .map(|(table_id, _)| *table_id)
            .collect();
        for table_id in &idle {
            state.drop_table(*table_id);
        }
        Ok(idle.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::overlay::conformance;

    fn store() -> MemoryOverlayStore {
        MemoryOverlayStore::new(Arc::new(SystemClock::new()))
    }

    #[tokio::test]
    async fn ephemerals_replace_per_user() {
        conformance::ephemerals_replace_per_user(&store()).await;
    }

    #[tokio::test]
    async fn ephemerals_stay_on_their_table() {
        conformance::ephemerals_stay_on_their_table(&store()).await;
    }

    #[tokio::test]
    async fn clear_all_for_user_reports_affected_tables() {
        conformance::clear_all_for_user_reports_affected_tables(&store()).await;
    }

    #[tokio::test]
    async fn ephemeral_sweep_spares_pinned_state() {
        conformance::ephemeral_sweep_spares_pinned_state(&store()).await;
    }

    #[tokio::test]
    async fn remove_measurement_reports_presence() {
        conformance::remove_measurement_reports_presence(&store()).await;
    }

    #[tokio::test]
    async fn persistents_key_by_scene_and_id() {
        conformance::persistents_key_by_scene_and_id(&store()).await;
    }

    #[tokio::test]
    async fn auras_upsert_per_token() {
        conformance::auras_upsert_per_token(&store()).await;
    }

    #[tokio::test]
    async fn scene_wipe_spares_other_scenes() {
        conformance::scene_wipe_spares_other_scenes(&store()).await;
    }

    #[tokio::test]
    async fn idle_tables_get_swept() {
        conformance::idle_tables_get_swept(&store()).await;
    }
}
