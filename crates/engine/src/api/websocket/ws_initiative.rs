//! Initiative handlers: the turn order and the turn marker.
//!
//! All of these are game-master operations; the services enforce that.

use super::*;

/// Append an entry to the scene's initiative order.
pub(super) async fn handle_add_entry(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    name: String,
    token_id: Option<TokenId>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .initiative
        .add_entry(user_id, table_id, scene_id, &name, token_id)
        .await
    {
        Ok(entry) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::InitiativeEntryAdded {
                        scene_id: scene_id.to_uuid(),
                        entry: InitiativeEntryData::from(&entry),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Advance the turn marker. A wrap back to the top starts a new round:
/// movement budgets come back and live measurements are swept.
pub(super) async fn handle_next_turn(
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
        .initiative
        .next_turn(user_id, table_id, scene_id)
        .await
    {
        Ok(outcome) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::InitiativeTurnAdvanced {
                        scene_id: scene_id.to_uuid(),
                        entry_id: outcome.entry_id.to_uuid(),
                        new_round: outcome.new_round,
                    },
                )
                .await;
            if outcome.new_round {
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::TokensMovementReset {
                            scene_id: scene_id.to_uuid(),
                            token_ids: outcome
                                .movement_reset
                                .into_iter()
                                .map(|id| id.to_uuid())
                                .collect(),
                        },
                    )
                    .await;
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::AllMeasurementsCleared {
                            ephemeral_only: true,
                        },
                    )
                    .await;
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Clear the whole initiative order.
pub(super) async fn handle_reset(
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
        .initiative
        .reset(user_id, table_id, scene_id)
        .await
    {
        Ok(()) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::InitiativeReset {
                        scene_id: scene_id.to_uuid(),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Remove one entry, optionally deleting the linked token with it.
pub(super) async fn handle_remove_entry(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    entry_id: EntryId,
    remove_token: bool,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .initiative
        .remove_entry(user_id, table_id, scene_id, entry_id, remove_token)
        .await
    {
        Ok(removed) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::InitiativeEntryRemoved {
                        scene_id: scene_id.to_uuid(),
                        entry_id: removed.entry.id.to_uuid(),
                    },
                )
                .await;
            if let Some(token_id) = removed.removed_token {
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::TokenRemoved {
                            token_id: token_id.to_uuid(),
                        },
                    )
                    .await;
                if removed.removed_aura {
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
                }
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Reorder the initiative; the new order goes out in full.
pub(super) async fn handle_reorder(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    order: Vec<EntryId>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .initiative
        .reorder(user_id, table_id, scene_id, &order)
        .await
    {
        Ok(entries) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::InitiativeOrderUpdated {
                        scene_id: scene_id.to_uuid(),
                        entries: entries.iter().map(InitiativeEntryData::from).collect(),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Rename an entry; a linked token takes the new name too.
pub(super) async fn handle_rename_entry(
    state: &WsState,
    connection_id: Uuid,
    scene_id: SceneId,
    entry_id: EntryId,
    name: String,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .initiative
        .rename_entry(user_id, table_id, scene_id, entry_id, &name)
        .await
    {
        Ok(renamed) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::InitiativeEntryUpdated {
                        scene_id: scene_id.to_uuid(),
                        entry: InitiativeEntryData::from(&renamed.entry),
                    },
                )
                .await;
            if let Some(token) = renamed.token {
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::TokenUpdated {
                            token: TokenData::from(&token),
                        },
                    )
                    .await;
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}
