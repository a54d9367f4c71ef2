//! Session lifecycle handlers: joining a table, status changes, transitions.

use super::*;

use chrono::{DateTime, Utc};
use gridhall_domain::TableStatus;

/// Subscribe the connection to a table's room and reply with the snapshot.
pub(super) async fn handle_join_table(
    state: &WsState,
    connection_id: Uuid,
    table_id: TableId,
) -> Option<ServerMessage> {
    let info = state.connections.get(connection_id).await?;
    let user_id = info.user_id;

    let snapshot = match state.app.use_cases.session.join(user_id, table_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => return Some(error_reply(e)),
    };

    // Whether the user was already present decides the playerJoined
    // broadcast, so read presence before registering this connection.
    let already_present = state
        .connections
        .user_still_connected(table_id, user_id)
        .await;
    state.connections.join_table(connection_id, table_id).await;

    tracing::info!(
        connection_id = %connection_id,
        table_id = %table_id,
        user_id = %user_id,
        new_member = snapshot.newly_joined,
        "User joined table session"
    );

    if !already_present {
        state
            .connections
            .broadcast_to_table_except(
                table_id,
                connection_id,
                ServerMessage::PlayerJoined {
                    user_id: user_id.to_uuid(),
                },
            )
            .await;
    }

    let connected_users = state
        .connections
        .users_in_table(table_id)
        .await
        .into_iter()
        .map(|user| user.to_uuid())
        .collect();

    Some(ServerMessage::InitialSessionState {
        table: TableData::from(&snapshot.table),
        scenes: snapshot.scenes.iter().map(SceneData::from).collect(),
        tokens: snapshot.tokens.iter().map(TokenData::from).collect(),
        measurements: snapshot
            .measurements
            .iter()
            .map(MeasurementData::from)
            .collect(),
        persistent_measurements: snapshot
            .persistent_measurements
            .iter()
            .map(PersistentMeasurementData::from)
            .collect(),
        auras: snapshot.auras.iter().map(AuraData::from).collect(),
        connected_users,
    })
}

/// Move the session through its lifecycle. Game master only.
pub(super) async fn handle_update_session_status(
    state: &WsState,
    connection_id: Uuid,
    status: SessionStatusData,
    paused_until: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    let Ok(next) = TableStatus::try_from(status) else {
        return Some(ServerMessage::error(
            ErrorCode::ValidationError,
            "Unknown session status",
        ));
    };

    let paused_until = match paused_until {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(e) => {
                return Some(ServerMessage::error(
                    ErrorCode::ValidationError,
                    format!("Invalid pausedUntil timestamp: {}", e),
                ));
            }
        },
        None => None,
    };

    match state
        .app
        .use_cases
        .session
        .set_status(user_id, table_id, next, paused_until)
        .await
    {
        Ok(table) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::SessionStatusUpdated {
                        status: table.status.into(),
                        paused_until: table.paused_until.map(|at| at.to_rfc3339()),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Start a scene transition effect. Game master only; the duration is
/// clamped server-side before it goes out.
pub(super) async fn handle_start_transition(
    state: &WsState,
    connection_id: Uuid,
    duration_ms: Option<u64>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .session
        .start_transition(user_id, table_id, duration_ms)
        .await
    {
        Ok(duration_ms) => {
            state
                .connections
                .broadcast_to_table(table_id, ServerMessage::SessionTransition { duration_ms })
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}
