//! Token handlers: placement, movement, edits, ownership.

use super::*;

use gridhall_domain::SquareId;

/// Place a new token on a scene. Game master only.
pub(super) async fn handle_place_token(
    state: &WsState,
    connection_id: Uuid,
    input: PlaceTokenInput,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state.app.use_cases.tokens.place(user_id, table_id, input).await {
        Ok(placed) => {
            let scene_id = placed.token.scene_id;
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::TokenPlaced {
                        token: TokenData::from(&placed.token),
                    },
                )
                .await;
            if let Some(entry) = placed.entry {
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
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Move a token to a new anchor square.
pub(super) async fn handle_move_token(
    state: &WsState,
    connection_id: Uuid,
    token_id: TokenId,
    target: SquareId,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .tokens
        .move_token(user_id, table_id, token_id, target)
        .await
    {
        Ok(outcome) => {
            state
                .connections
                .broadcast_to_table(table_id, token_moved(&outcome))
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Undo the token's most recent move; goes out as a regular move back.
pub(super) async fn handle_undo_move(
    state: &WsState,
    connection_id: Uuid,
    token_id: TokenId,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .tokens
        .undo_move(user_id, table_id, token_id)
        .await
    {
        Ok(outcome) => {
            state
                .connections
                .broadcast_to_table(table_id, token_moved(&outcome))
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Edit token fields. Game master only; a rename carries over to the
/// linked initiative entry.
pub(super) async fn handle_edit_token(
    state: &WsState,
    connection_id: Uuid,
    input: EditTokenInput,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state.app.use_cases.tokens.edit(user_id, table_id, input).await {
        Ok(outcome) => {
            let scene_id = outcome.token.scene_id;
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::TokenUpdated {
                        token: TokenData::from(&outcome.token),
                    },
                )
                .await;
            if let Some(entry) = outcome.renamed_entry {
                state
                    .connections
                    .broadcast_to_table(
                        table_id,
                        ServerMessage::InitiativeEntryUpdated {
                            scene_id: scene_id.to_uuid(),
                            entry: InitiativeEntryData::from(&entry),
                        },
                    )
                    .await;
            }
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Assign the token to a player, or clear the assignment. Game master only.
pub(super) async fn handle_assign_token(
    state: &WsState,
    connection_id: Uuid,
    token_id: TokenId,
    new_owner: Option<UserId>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .tokens
        .assign(user_id, table_id, token_id, new_owner)
        .await
    {
        Ok(token) => {
            state
                .connections
                .broadcast_to_table(
                    table_id,
                    ServerMessage::TokenOwnerUpdated {
                        token_id: token.id.to_uuid(),
                        owner: token.owner.map(|owner| owner.to_uuid()),
                    },
                )
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}

/// Both a move and an undo come out as the same wire event: the token went
/// from one square to another with a budget left over.
fn token_moved(outcome: &crate::use_cases::MoveOutcome) -> ServerMessage {
    ServerMessage::TokenMoved {
        token_id: outcome.token.id.to_uuid(),
        old_square_id: outcome.from,
        square_id: outcome.token.square,
        remaining_movement: outcome.token.movement_left,
    }
}
