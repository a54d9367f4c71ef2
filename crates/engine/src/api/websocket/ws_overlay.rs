//! Overlay handlers: live measurements, pinned measurements, auras, pings.

use super::*;

use gridhall_domain::Point;

/// Share the user's live measurement, replacing their previous one.
pub(super) async fn handle_share_measurement(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    geometry: ShapeGeometry,
    color: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .share_measurement(user_id, table_id, scene_id, geometry, color)
        .await
    {
        Ok(measurement) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::MeasurementShared {
                        measurement: MeasurementData::from(&measurement),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Withdraw the user's live measurement. Nothing shared means nothing to
/// tell the room.
pub(super) async fn handle_remove_measurement(
    state: &WsState,
    connection_id: Uuid,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .remove_measurement(user_id, table_id)
        .await
    {
        Ok(true) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::MeasurementRemoved {
                        user_id: user_id.to_uuid(),
                    },
                )
                .await;
            None
        }
        Ok(false) => None,
        Err(e) => Some(error_reply(e)),
    }
}

/// Pin a measurement to the scene. Game master only.
pub(super) async fn handle_add_persistent(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    id: Option<String>,
    geometry: ShapeGeometry,
    color: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .add_persistent(user_id, table_id, scene_id, id, geometry, color)
        .await
    {
        Ok(measurement) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::PersistentMeasurementAdded {
                        measurement: PersistentMeasurementData::from(&measurement),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Remove a pinned measurement. Game master only.
pub(super) async fn handle_remove_persistent(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    id: String,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .remove_persistent(user_id, table_id, scene_id, &id)
        .await
    {
        Ok(()) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::PersistentMeasurementRemoved {
                        scene_id: scene_id.to_uuid(),
                        id,
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Create or replace the aura on a token.
pub(super) async fn handle_upsert_aura(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    token_id: TokenId,
    radius_meters: f64,
    color: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .upsert_aura(user_id, table_id, scene_id, token_id, radius_meters, color)
        .await
    {
        Ok(aura) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::AuraUpserted {
                        aura: AuraData::from(&aura),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Remove the aura on a token. Game master only.
pub(super) async fn handle_remove_aura(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    token_id: TokenId,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .remove_aura(user_id, table_id, scene_id, token_id)
        .await
    {
        Ok(()) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::AuraRemoved {
                        scene_id: scene_id.to_uuid(),
                        token_id: token_id.to_uuid(),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Wipe every overlay on the table. Game master only.
pub(super) async fn handle_clear_all(
    state: &WsState,
    connection_id: Uuid,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .overlays
        .clear_all(user_id, table_id)
        .await
    {
        Ok(()) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::AllMeasurementsCleared {
                        ephemeral_only: false,
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Flash a point on the map for everyone in the room.
///
/// Pings are transient and never stored, so there is no service behind
/// them; membership was already settled when the connection joined.
pub(super) async fn handle_ping(
    state: &WsState,
    connection_id: Uuid,
    scene_id: Uuid,
    point: Point,
    color: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    if !point.x.is_finite() || !point.y.is_finite() {
        return Some(ServerMessage::error(
            ErrorCode::ValidationError,
            "Ping coordinates must be finite numbers",
        ));
    }

    state
        .connections
        .broadcast_to_table(
            table_id,
            ServerMessage::PingBroadcast {
                scene_id,
                user_id: user_id.to_uuid(),
                point,
                color,
            },
        )
        .await;
    None
}
