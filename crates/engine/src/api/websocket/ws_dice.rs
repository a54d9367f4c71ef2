//! Dice handler: roll for the whole room to see.

use super::*;

/// Roll dice and broadcast the outcome, optionally attributed to a
/// character the roller is allowed to speak for.
pub(super) async fn handle_roll_dice(
    state: &WsState,
    connection_id: Uuid,
    formula: String,
    label: Option<String>,
    character_id: Option<CharacterId>,
) -> Option<ServerMessage> {
    let Some((user_id, table_id)) = joined(state, connection_id).await else {
        return Some(join_required());
    };

    match state
        .app
        .use_cases
        .dice
        .roll(user_id, table_id, &formula, character_id)
        .await
    {
        Ok(rolled) => {
            let mut roll = DiceRollData::from_result(user_id.to_uuid(), &rolled.result, label);
            if let Some(character_id) = rolled.character_id {
                roll = roll.with_character(character_id.to_uuid());
            }
            state
                .connections
                .broadcast_to_table(table_id, ServerMessage::DiceRolled { roll })
                .await;
            None
        }
        Err(e) => Some(error_reply(e)),
    }
}
