//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::overlay::OverlayStore;
use crate::infrastructure::ports::{
    CharacterRepo, ClockPort, RandomPort, SceneRepo, TableRepo, TokenRepo,
};
use crate::infrastructure::scene_locks::SceneLocks;
use crate::use_cases::{DiceOps, InitiativeOps, OverlayOps, SceneOps, SessionOps, TokenOps};

/// Main application state.
///
/// Holds all repositories and use cases.
/// Passed to HTTP/WebSocket handlers via Axum state.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Container for the document-store repositories.
pub struct Repositories {
    pub tables: Arc<dyn TableRepo>,
    pub scenes: Arc<dyn SceneRepo>,
    pub tokens: Arc<dyn TokenRepo>,
    pub characters: Arc<dyn CharacterRepo>,
}

/// Container for all use cases.
pub struct UseCases {
    pub session: SessionOps,
    pub tokens: TokenOps,
    pub initiative: InitiativeOps,
    pub scenes: SceneOps,
    pub overlays: OverlayOps,
    pub dice: DiceOps,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        repositories: Repositories,
        overlays: Arc<dyn OverlayStore>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        // One lock registry for every path that serializes on a scene.
        let scene_locks = Arc::new(SceneLocks::new());

        let use_cases = UseCases {
            session: SessionOps::new(
                repositories.tables.clone(),
                repositories.scenes.clone(),
                repositories.tokens.clone(),
                overlays.clone(),
                clock.clone(),
            ),
            tokens: TokenOps::new(
                repositories.tables.clone(),
                repositories.scenes.clone(),
                repositories.tokens.clone(),
                repositories.characters.clone(),
                scene_locks.clone(),
                clock.clone(),
            ),
            initiative: InitiativeOps::new(
                repositories.tables.clone(),
                repositories.scenes.clone(),
                repositories.tokens.clone(),
                overlays.clone(),
                clock.clone(),
            ),
            scenes: SceneOps::new(
                repositories.tables.clone(),
                repositories.scenes.clone(),
                repositories.tokens.clone(),
                overlays.clone(),
                scene_locks,
                clock.clone(),
            ),
            overlays: OverlayOps::new(
                repositories.tables.clone(),
                repositories.scenes.clone(),
                repositories.tokens.clone(),
                overlays,
                random.clone(),
            ),
            dice: DiceOps::new(
                repositories.tables.clone(),
                repositories.characters.clone(),
                random,
            ),
        };

        Self {
            repositories,
            use_cases,
        }
    }
}
