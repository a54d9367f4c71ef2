//! WebSocket handling for live table sessions.
//!
//! Each connection authenticates during the handshake, subscribes to one
//! table's room via `joinTable`, and from then on exchanges JSON text frames:
//! `ClientMessage` in, `ServerMessage` out. Accepted requests are broadcast
//! to the room; rejected ones get a scoped error reply to the requester and
//! are never broadcast.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

mod ws_dice;
mod ws_initiative;
mod ws_overlay;
mod ws_scene;
mod ws_session;
mod ws_token;

use gridhall_domain::{CharacterId, EntryId, SceneId, ShapeGeometry, TableId, TokenId, UserId};
use gridhall_protocol::{
    AuraData, ClientMessage, DiceRollData, ErrorCode, InitiativeEntryData, MeasurementData,
    PersistentMeasurementData, SceneData, ServerMessage, SessionStatusData, TableData, TokenData,
};

use super::connections::{ConnectionInfo, ConnectionManager};
use crate::app::App;
use crate::infrastructure::ports::AuthPort;
use crate::use_cases::{EditTokenInput, PlaceTokenInput, SceneSwitch, ServiceError};

/// Buffer size for per-connection message channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// Combined state for WebSocket handlers.
pub struct WsState {
    pub app: Arc<App>,
    pub connections: Arc<ConnectionManager>,
    pub auth: Arc<dyn AuthPort>,
}

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer credential, resolved to a user before any event is processed.
    #[serde(default)]
    token: Option<String>,
}

/// Handle WebSocket upgrade requests.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>, token: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Credential check comes first: a rejected socket gets exactly one error
    // frame and the close, and is never registered anywhere.
    let user_id = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected WebSocket credential");
            let reply = ServerMessage::error(ErrorCode::Unauthenticated, e.to_string());
            if let Ok(json) = serde_json::to_string(&reply) {
                let _ = ws_sender.send(Message::Text(json.into())).await;
            }
            let _ = ws_sender.close().await;
            return;
        }
    };

    // Create a unique client ID for this connection
    let connection_id = Uuid::new_v4();

    // Create a bounded channel for sending messages to this client
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    // Register the connection
    state
        .connections
        .register(connection_id, user_id, tx.clone())
        .await;

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        "WebSocket connection established"
    );

    // Spawn a task to forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => {
                    if let Some(response) = handle_message(msg, &state, connection_id).await {
                        if tx.try_send(response).is_err() {
                            tracing::warn!(
                                connection_id = %connection_id,
                                "Failed to send response, channel full or closed"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Failed to parse message");
                    let error = ServerMessage::error(
                        ErrorCode::ValidationError,
                        format!("Invalid message format: {}", e),
                    );
                    let _ = tx.try_send(error);
                }
            },
            Ok(Message::Ping(_)) => {
                let _ = tx.try_send(ServerMessage::Pong);
            }
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Clean up. Unregister before the presence check so the departing
    // connection never counts itself.
    let info = state.connections.unregister(connection_id).await;
    send_task.abort();

    if let Some(info) = info {
        disconnect_cleanup(&state, &info).await;
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connection terminated");
}

/// Drop the departed user's live measurements and settle room presence.
///
/// Every room that lost a measurement hears `measurementRemoved`; the room
/// this connection sat in additionally hears `playerLeft` once the user's
/// last connection is gone.
async fn disconnect_cleanup(state: &WsState, info: &ConnectionInfo) {
    match state
        .app
        .use_cases
        .overlays
        .disconnect_cleanup(info.user_id)
        .await
    {
        Ok(affected_tables) => {
            for table_id in affected_tables {
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::MeasurementRemoved {
                            user_id: info.user_id.to_uuid(),
                        },
                    )
                    .await;
            }
        }
        Err(e) => {
            tracing::error!(user_id = %info.user_id, error = %e, "Disconnect cleanup failed");
        }
    }

    let Some(table_id) = info.table_id else {
        return;
    };
    if !state
        .connections
        .user_still_connected(table_id, info.user_id)
        .await
    {
        state
            .connections
            .broadcast_to_table(
                table_id,
                ServerMessage::PlayerLeft {
                    user_id: info.user_id.to_uuid(),
                },
            )
            .await;
    }
}

/// Dispatch a parsed client message to the appropriate handler.
async fn handle_message(
    msg: ClientMessage,
    state: &WsState,
    connection_id: Uuid,
) -> Option<ServerMessage> {
    match msg {
        // Connection lifecycle
        ClientMessage::Heartbeat => Some(ServerMessage::Pong),

        ClientMessage::JoinTable { table_id } => {
            ws_session::handle_join_table(state, connection_id, TableId::from_uuid(table_id)).await
        }

        // Tokens
        ClientMessage::RequestPlaceToken {
            scene_id,
            name,
            square_id,
            size,
            color,
            image_asset,
            character_id,
            owner,
            can_overlap,
            movement_max,
            add_to_initiative,
        } => {
            let input = PlaceTokenInput {
                scene_id: SceneId::from_uuid(scene_id),
                name,
                square: square_id,
                size,
                color,
                image_asset,
                character_id: character_id.map(CharacterId::from_uuid),
                owner: owner.map(UserId::from_uuid),
                can_overlap,
                movement_max,
                add_to_initiative,
            };
            ws_token::handle_place_token(state, connection_id, input).await
        }

        ClientMessage::RequestMoveToken {
            token_id,
            square_id,
        } => {
            ws_token::handle_move_token(
                state,
                connection_id,
                TokenId::from_uuid(token_id),
                square_id,
            )
            .await
        }

        ClientMessage::RequestUndoMove { token_id } => {
            ws_token::handle_undo_move(state, connection_id, TokenId::from_uuid(token_id)).await
        }

        ClientMessage::RequestEditToken {
            token_id,
            name,
            color,
            image_asset,
            size,
            can_overlap,
            movement_max,
        } => {
            let input = EditTokenInput {
                token_id: TokenId::from_uuid(token_id),
                name,
                color,
                image_asset,
                size,
                can_overlap,
                movement_max,
            };
            ws_token::handle_edit_token(state, connection_id, input).await
        }

        ClientMessage::RequestAssignToken { token_id, owner } => {
            ws_token::handle_assign_token(
                state,
                connection_id,
                TokenId::from_uuid(token_id),
                owner.map(UserId::from_uuid),
            )
            .await
        }

        // Initiative
        ClientMessage::RequestAddCharacterToInitiative {
            scene_id,
            name,
            token_id,
        } => {
            ws_initiative::handle_add_entry(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                name,
                token_id.map(TokenId::from_uuid),
            )
            .await
        }

        ClientMessage::RequestNextTurn { scene_id } => {
            ws_initiative::handle_next_turn(state, connection_id, SceneId::from_uuid(scene_id))
                .await
        }

        ClientMessage::RequestResetInitiative { scene_id } => {
            ws_initiative::handle_reset(state, connection_id, SceneId::from_uuid(scene_id)).await
        }

        ClientMessage::RequestRemoveFromInitiative {
            scene_id,
            entry_id,
            remove_token,
        } => {
            ws_initiative::handle_remove_entry(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                EntryId::from_uuid(entry_id),
                remove_token,
            )
            .await
        }

        ClientMessage::RequestReorderInitiative {
            scene_id,
            entry_ids,
        } => {
            let order: Vec<EntryId> = entry_ids.into_iter().map(EntryId::from_uuid).collect();
            ws_initiative::handle_reorder(state, connection_id, SceneId::from_uuid(scene_id), order)
                .await
        }

        ClientMessage::RequestEditInitiativeEntry {
            scene_id,
            entry_id,
            name,
        } => {
            ws_initiative::handle_rename_entry(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                EntryId::from_uuid(entry_id),
                name,
            )
            .await
        }

        // Measurements & Auras
        ClientMessage::RequestShareMeasurement {
            scene_id,
            geometry,
            color,
        } => {
            ws_overlay::handle_share_measurement(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                geometry.into(),
                color,
            )
            .await
        }

        ClientMessage::RequestRemoveMeasurement => {
            ws_overlay::handle_remove_measurement(state, connection_id).await
        }

        ClientMessage::RequestAddPersistentMeasurement {
            scene_id,
            id,
            geometry,
            color,
        } => {
            ws_overlay::handle_add_persistent(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                id,
                geometry.into(),
                color,
            )
            .await
        }

        ClientMessage::RequestRemovePersistentMeasurement { scene_id, id } => {
            ws_overlay::handle_remove_persistent(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                id,
            )
            .await
        }

        ClientMessage::RequestUpsertAura {
            scene_id,
            token_id,
            radius_meters,
            color,
        } => {
            ws_overlay::handle_upsert_aura(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                TokenId::from_uuid(token_id),
                radius_meters,
                color,
            )
            .await
        }

        ClientMessage::RequestRemoveAura { scene_id, token_id } => {
            ws_overlay::handle_remove_aura(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                TokenId::from_uuid(token_id),
            )
            .await
        }

        ClientMessage::RequestClearAllMeasurements => {
            ws_overlay::handle_clear_all(state, connection_id).await
        }

        ClientMessage::RequestPing {
            scene_id,
            point,
            color,
        } => ws_overlay::handle_ping(state, connection_id, scene_id, point, color).await,

        // Scenes
        ClientMessage::RequestCreateScene { name, map_asset } => {
            ws_scene::handle_create_scene(state, connection_id, name, map_asset).await
        }

        ClientMessage::RequestRenameScene { scene_id, name } => {
            ws_scene::handle_rename_scene(state, connection_id, SceneId::from_uuid(scene_id), name)
                .await
        }

        ClientMessage::RequestDeleteScene { scene_id } => {
            ws_scene::handle_delete_scene(state, connection_id, SceneId::from_uuid(scene_id)).await
        }

        ClientMessage::RequestSetActiveScene { scene_id } => {
            ws_scene::handle_set_active_scene(state, connection_id, SceneId::from_uuid(scene_id))
                .await
        }

        ClientMessage::RequestSetMap {
            scene_id,
            map_asset,
        } => {
            ws_scene::handle_set_map(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                map_asset,
            )
            .await
        }

        ClientMessage::RequestReorderScenes { scene_ids } => {
            let order: Vec<SceneId> = scene_ids.into_iter().map(SceneId::from_uuid).collect();
            ws_scene::handle_reorder_scenes(state, connection_id, order).await
        }

        ClientMessage::RequestUpdateGridDimensions {
            scene_id,
            width,
            height,
        } => {
            ws_scene::handle_update_grid_dimensions(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                width,
                height,
            )
            .await
        }

        ClientMessage::RequestUpdateSceneScale {
            scene_id,
            meters_per_square,
        } => {
            ws_scene::handle_update_scene_scale(
                state,
                connection_id,
                SceneId::from_uuid(scene_id),
                meters_per_square,
            )
            .await
        }

        // Session
        ClientMessage::RequestUpdateSessionStatus {
            status,
            paused_until,
        } => {
            ws_session::handle_update_session_status(state, connection_id, status, paused_until)
                .await
        }

        ClientMessage::RequestStartTransition { duration_ms } => {
            ws_session::handle_start_transition(state, connection_id, duration_ms).await
        }

        // Dice
        ClientMessage::RequestRollDice {
            formula,
            label,
            character_id,
        } => {
            ws_dice::handle_roll_dice(
                state,
                connection_id,
                formula,
                label,
                character_id.map(CharacterId::from_uuid),
            )
            .await
        }

        ClientMessage::Unknown => {
            tracing::warn!(connection_id = %connection_id, "Unknown message type received");
            Some(ServerMessage::error(
                ErrorCode::ValidationError,
                "Unknown message type",
            ))
        }
    }
}

// =============================================================================
// Shared handler plumbing
// =============================================================================

/// Resolve the connection to its user and joined table.
///
/// Every message except `joinTable` only makes sense inside a room.
async fn joined(state: &WsState, connection_id: Uuid) -> Option<(UserId, TableId)> {
    let info = state.connections.get(connection_id).await?;
    let table_id = info.table_id?;
    Some((info.user_id, table_id))
}

fn join_required() -> ServerMessage {
    ServerMessage::error(ErrorCode::Forbidden, "Join a table first")
}

/// Map a service failure to the scoped error reply for the requester.
fn error_reply(e: ServiceError) -> ServerMessage {
    let message = e.to_string();
    match e {
        ServiceError::NotFound(_) => ServerMessage::error(ErrorCode::NotFound, message),
        ServiceError::Forbidden(_) => ServerMessage::error(ErrorCode::Forbidden, message),
        ServiceError::InvalidInput(_) => ServerMessage::error(ErrorCode::ValidationError, message),
        ServiceError::Conflict(_) => ServerMessage::error(ErrorCode::Conflict, message),
        ServiceError::InsufficientMovement {
            required,
            available,
        } => ServerMessage::error_with_details(
            ErrorCode::ResourceExhausted,
            message,
            serde_json::json!({ "required": required, "available": available }),
        ),
        ServiceError::Repo(_) | ServiceError::Overlay(_) => {
            tracing::error!(error = %message, "Storage failure while handling a session event");
            ServerMessage::error(ErrorCode::InternalError, "Something went wrong on our side")
        }
    }
}

// =============================================================================
// WebSocket Integration Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support;
