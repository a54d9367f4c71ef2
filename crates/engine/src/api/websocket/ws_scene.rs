//! Scene handlers: the scene list, the active scene, grid geometry.
//!
//! All of these are game-master operations; the services enforce that.

use super::*;

/// Create a new scene. A table's first scene goes straight on stage.
pub(super) async fn handle_create_scene(
    state: &WsState,
    connection_id: Uuid,
    name: String,
    map_asset: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .create(user_id, table_id, &name, map_asset)
        .await
    {
        Ok(created) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::SceneCreated {
                        scene: SceneData::from(&created.scene),
                    },
                )
                .await;
            if created.became_active {
                // The payload shape stays uniform even though a brand-new
                // scene has nothing on it yet.
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::ActiveSceneChanged {
                            scene: SceneData::from(&created.scene),
                            tokens: Vec::new(),
                            persistent_measurements: Vec::new(),
                            auras: Vec::new(),
                        },
                    )
                    .await;
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Rename a scene.
pub(super) async fn handle_rename_scene(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    name: String,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .rename(user_id, table_id, scene_id, &name)
        .await
    {
        Ok(scene) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::SceneRenamed {
                        scene_id: scene.id.to_uuid(),
                        name: scene.name,
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Delete a scene and everything on it. Deleting the active scene puts the
/// next one on stage, and the room hears about both steps.
pub(super) async fn handle_delete_scene(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .delete(user_id, table_id, scene_id)
        .await
    {
        Ok(deleted) => {
            tracing::info!(
                table_id = %table_id,
                scene_id = %scene_id,
                removed_tokens = deleted.removed_tokens.len(),
                "Scene deleted"
            );
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::SceneDeleted {
                        scene_id: scene_id.to_uuid(),
                        active_scene_id: deleted.active_scene.map(|id| id.to_uuid()),
                    },
                )
                .await;
            if let Some(switch) = deleted.switched_to {
                state
                    .connections
                    .broadcast_to_table(table_id, active_scene_changed(&switch))
                    .await;
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Switch which scene everybody sees.
pub(super) async fn handle_set_active_scene(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .set_active(user_id, table_id, scene_id)
        .await
    {
        Ok(switch) => {
            state
                .connections
                .broadcast_to_table(table_id, active_scene_changed(&switch))
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Set or clear the scene's map image.
pub(super) async fn handle_set_map(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    map_asset: Option<String>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .set_map(user_id, table_id, scene_id, map_asset)
        .await
    {
        Ok(scene) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::MapUpdated {
                        scene_id: scene.id.to_uuid(),
                        map_asset: scene.map_asset,
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Reorder the scene list.
pub(super) async fn handle_reorder_scenes(
    state: &WsState,
    connection_id: Uuid,
    order: Vec<SceneId>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .reorder(user_id, table_id, &order)
        .await
    {
        Ok(scene_ids) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::ScenesReordered {
                        scene_ids: scene_ids.into_iter().map(|id| id.to_uuid()).collect(),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Resize the grid. Rejected when any token would end up outside it.
pub(super) async fn handle_update_grid_dimensions(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    width: u32,
    height: u32,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .set_grid_dimensions(user_id, table_id, scene_id, width, height)
        .await
    {
        Ok(scene) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::GridDimensionsUpdated {
                        scene_id: scene.id.to_uuid(),
                        width: scene.grid_width,
                        height: scene.grid_height,
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Change how many meters one square covers.
pub(super) async fn handle_update_scene_scale(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    meters_per_square: f64,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .scenes
        .set_scale(user_id, table_id, scene_id, meters_per_square)
        .await
    {
        Ok(scene) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::SceneScaleUpdated {
                        scene_id: scene.id.to_uuid(),
                        meters_per_square: scene.meters_per_square,
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Full payload of the scene now on stage.
fn active_scene_changed(switch: &SceneSwitch) -> ServerMessage {
    ServerMessage::ActiveSceneChanged {
        scene: SceneData::from(&switch.scene),
        tokens: switch.tokens.iter().map(TokenData::from).collect(),
        persistent_measurements: switch
            .persistent_measurements
            .iter()
            .map(PersistentMeasurementData::from)
            .collect(),
        auras: switch.auras.iter().map(AuraData::from).collect(),
    }
}
