//! Per-scene mutation locks.
//!
//! Token placement, movement and undo run a read-validate-write sequence
//! against the document store. Two near-simultaneous moves on the same scene
//! could otherwise both pass the collision check and both write. The registry
//! hands out one async mutex per scene; callers hold it across the whole
//! sequence. Scenes never block each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use gridhall_domain::SceneId;

#[derive(Default)]
pub struct SceneLocks {
    locks: DashMap<SceneId, Arc<Mutex<()>>>,
}

impl SceneLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a scene, created on first use. Clone the `Arc` out and
    /// hold the guard for the whole read-validate-write sequence.
    pub fn for_scene(&self, scene_id: SceneId) -> Arc<Mutex<()>> {
        self.locks
            .entry(scene_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget a deleted scene's lock.
    pub fn remove(&self, scene_id: SceneId) {
        self.locks.remove(&scene_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
