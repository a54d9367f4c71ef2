use super::*;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use gridhall_domain::{Scene, Table};

use crate::app::{App, Repositories};
use crate::infrastructure::auth::BearerRegistry;
use crate::infrastructure::clock::{FixedRandom, SystemClock};
use crate::infrastructure::memory::{
    MemoryCharacterRepo, MemorySceneRepo, MemoryTableRepo, MemoryTokenRepo,
};
use crate::infrastructure::overlay::MemoryOverlayStore;
use crate::infrastructure::ports::{ClockPort, RandomPort, SceneRepo, TableRepo};

pub(crate) const GM_TOKEN: &str = "gm-dev";
pub(crate) const PLAYER_TOKEN: &str = "player-dev";

/// Die face every roll lands on, so dice assertions are deterministic.
pub(crate) const FIXED_DIE: u32 = 4;

pub(crate) type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// State behind the socket plus the repos for seeding and the two seeded
/// users. Storage is the real in-memory kind; only time and dice are pinned.
pub(crate) struct Harness {
    pub(crate) state: Arc<WsState>,
    pub(crate) tables: Arc<MemoryTableRepo>,
    pub(crate) scenes: Arc<MemorySceneRepo>,
    pub(crate) gm: UserId,
    pub(crate) player: UserId,
}

pub(crate) fn harness() -> Harness {
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let random: Arc<dyn RandomPort> = Arc::new(FixedRandom(FIXED_DIE));

    let tables = Arc::new(MemoryTableRepo::new());
    let scenes = Arc::new(MemorySceneRepo::new());
    let overlays = Arc::new(MemoryOverlayStore::new(clock.clone()));

    let gm = UserId::new();
    let player = UserId::new();
    let auth = BearerRegistry::from_spec(&format!(
        "{GM_TOKEN}={}, {PLAYER_TOKEN}={}",
        gm.to_uuid(),
        player.to_uuid()
    ));

    let repositories = Repositories {
        tables: tables.clone(),
        scenes: scenes.clone(),
        tokens: Arc::new(MemoryTokenRepo::new()),
        characters: Arc::new(MemoryCharacterRepo::new()),
    };
    let app = Arc::new(App::new(repositories, overlays, clock, random));

    let state = Arc::new(WsState {
        app,
        connections: Arc::new(ConnectionManager::new()),
        auth: Arc::new(auth),
    });

    Harness {
        state,
        tables,
        scenes,
        gm,
        player,
    }
}

impl Harness {
    /// A table owned by the harness GM with one scene, already active.
    pub(crate) async fn seed_table(&self) -> (Table, Scene) {
        let mut table = Table::new("Ruins of Vel", self.gm, "RUIN1234");
        let scene = Scene::new(table.id, "Courtyard");
        table.add_scene(scene.id, Utc::now());
        self.tables.save(&table).await.unwrap();
        self.scenes.save(&scene).await.unwrap();
        (table, scene)
    }
}

pub(crate) async fn spawn_ws_server(
    state: Arc<WsState>,
) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = axum::Router::new().route("/ws", get(ws_handler).with_state(state));

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, handle)
}

pub(crate) async fn ws_connect(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{addr}/ws?token={token}");
    let (ws, _resp) = connect_async(url).await.unwrap();
    ws
}

pub(crate) async fn ws_send_client(ws: &mut WsClient, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(WsMessage::Text(json.into())).await.unwrap();
}

pub(crate) async fn ws_recv_server(ws: &mut WsClient) -> ServerMessage {
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        match msg {
            WsMessage::Text(text) => {
                return serde_json::from_str::<ServerMessage>(&text).unwrap();
            }
            WsMessage::Binary(bin) => {
                let text = String::from_utf8(bin).unwrap();
                return serde_json::from_str::<ServerMessage>(&text).unwrap();
            }
            _ => {}
        }
    }
}

pub(crate) async fn ws_expect_message<F>(
    ws: &mut WsClient,
    timeout: Duration,
    mut predicate: F,
) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let msg = ws_recv_server(ws).await;
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await
    .unwrap()
}

pub(crate) async fn ws_expect_no_message_matching<F>(
    ws: &mut WsClient,
    timeout: Duration,
    mut predicate: F,
) where
    F: FnMut(&ServerMessage) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            let msg = ws_recv_server(ws).await;
            if predicate(&msg) {
                panic!("unexpected message: {:?}", msg);
            }
        }
    })
    .await;

    // Only the timeout path means no matching message arrived.
    assert!(result.is_err());
}

/// Join a table and swallow the snapshot reply, returning it for assertions.
pub(crate) async fn ws_join(ws: &mut WsClient, table_id: TableId) -> ServerMessage {
    ws_send_client(
        ws,
        &ClientMessage::JoinTable {
            table_id: table_id.to_uuid(),
        },
    )
    .await;
    ws_expect_message(ws, Duration::from_secs(2), |msg| {
        matches!(msg, ServerMessage::InitialSessionState { .. })
    })
    .await
}
