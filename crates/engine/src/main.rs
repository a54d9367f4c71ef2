//! GridHall Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod config;
mod infrastructure;
mod use_cases;

use api::{websocket::WsState, ConnectionManager};
use app::{App, Repositories};
use config::AppSettings;
use gridhall_domain::{Scene, Table, UserId};
use infrastructure::auth::BearerRegistry;
use infrastructure::clock::{SystemClock, SystemRandom};
use infrastructure::memory::{
    MemoryCharacterRepo, MemorySceneRepo, MemoryTableRepo, MemoryTokenRepo,
};
use infrastructure::overlay::build_overlay_store;
use infrastructure::ports::{ClockPort, RandomPort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from the workspace root (the engine usually runs from
    // `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridhall_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting GridHall Engine");

    let settings = AppSettings::from_env();

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let random: Arc<dyn RandomPort> = Arc::new(SystemRandom::new());

    let overlays = build_overlay_store(&settings, clock.clone()).await?;

    let auth = Arc::new(BearerRegistry::from_spec(&settings.auth_tokens));
    if auth.is_empty() {
        tracing::warn!("GRIDHALL_AUTH_TOKENS is empty, the engine will authenticate nobody");
    } else {
        tracing::info!(credentials = auth.len(), "Seeded the credential registry");
    }

    let repositories = Repositories {
        tables: Arc::new(MemoryTableRepo::new()),
        scenes: Arc::new(MemorySceneRepo::new()),
        tokens: Arc::new(MemoryTokenRepo::new()),
        characters: Arc::new(MemoryCharacterRepo::new()),
    };

    let app = Arc::new(App::new(
        repositories,
        overlays.clone(),
        clock.clone(),
        random.clone(),
    ));

    if let Some(game_master) = settings.seed_gm {
        seed_demo_table(&app, game_master, random.as_ref()).await?;
    }

    // Sweep overlay state of idle tables in the background.
    let reaper_overlays = overlays.clone();
    let max_idle = settings.overlay_max_idle;
    let reaper_interval = settings.reaper_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reaper_interval);
        loop {
            ticker.tick().await;
            match reaper_overlays.cleanup_inactive_tables(max_idle).await {
                Ok(0) => {}
                Ok(swept) => tracing::info!(swept, "Swept overlay state of idle tables"),
                Err(e) => tracing::warn!(error = %e, "Overlay sweep failed"),
            }
        }
    });

    let connections = Arc::new(ConnectionManager::new());
    let ws_state = Arc::new(WsState {
        app,
        connections,
        auth,
    });

    let mut router = api::http::routes()
        .route("/ws", get(api::websocket::ws_handler))
        .with_state(ws_state)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer(settings.cors_origin.as_deref()) {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{}:{}", settings.bind_addr, settings.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Seed one table with one scene so a fresh development process has
/// something to join.
async fn seed_demo_table(
    app: &App,
    game_master: uuid::Uuid,
    random: &dyn RandomPort,
) -> anyhow::Result<()> {
    let game_master = UserId::from_uuid(game_master);
    let invite_code = random.short_id().to_uppercase();

    let mut table = Table::new("Demo Table", game_master, invite_code);
    let scene = Scene::new(table.id, "Scene 1");
    table.add_scene(scene.id, chrono::Utc::now());

    app.repositories.scenes.save(&scene).await?;
    app.repositories.tables.save(&table).await?;

    tracing::info!(
        table_id = %table.id,
        invite_code = %table.invite_code,
        "Seeded a demo table for the configured game master"
    );
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer(allowed_origins: Option<&str>) -> Option<CorsLayer> {
    let allowed_origins = allowed_origins.map(str::trim).filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        // Session auth rides the query string; only JSON bodies need headers.
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
