//! Permission predicates, evaluated fresh on every request.
//!
//! Role is never cached on the connection: the table loaded for the request
//! decides who is game master and who merely plays.

use gridhall_domain::{Scene, Table, Token, UserId};

/// The user whose linked token holds the current initiative turn, if any.
///
/// Entries without a token, and tokens without an owner, yield `None`.
pub fn turn_owner(scene: &Scene, scene_tokens: &[Token]) -> Option<UserId> {
    let token_id = scene.current_entry()?.token_id?;
    scene_tokens.iter().find(|t| t.id == token_id)?.owner
}

/// Game masters move anything; players move their own token, on the active
/// scene, while its linked entry holds the turn.
pub fn can_move_token(table: &Table, scene: &Scene, token: &Token, user_id: UserId) -> bool {
    if table.is_game_master(user_id) {
        return true;
    }
    token.is_owned_by(user_id)
        && table.active_scene == Some(scene.id)
        && scene.current_entry().and_then(|e| e.token_id) == Some(token.id)
}

/// Live measurements belong to the game master or whoever holds the turn.
pub fn can_share_measurement(table: &Table, turn_owner: Option<UserId>, user_id: UserId) -> bool {
    table.is_game_master(user_id) || turn_owner == Some(user_id)
}

/// Auras additionally open up to the token's owner, turn or not.
pub fn can_upsert_aura(
    table: &Table,
    token: &Token,
    turn_owner: Option<UserId>,
    user_id: UserId,
) -> bool {
    table.is_game_master(user_id) || turn_owner == Some(user_id) || token.is_owned_by(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gridhall_domain::{SquareId, TokenSize};

    fn fixture() -> (Table, Scene, Token, UserId, UserId) {
        let gm = UserId::new();
        let player = UserId::new();
        let mut table = Table::new("War Room", gm, "ABCD1234");
        table.add_member(player, Utc::now());
        let scene = Scene::new(table.id, "Cellar");
        table.add_scene(scene.id, Utc::now());
        let mut token = Token::new(
            table.id,
            scene.id,
            "Brynn",
            SquareId::new(0),
            TokenSize::Medium,
            9.0,
        );
        token.owner = Some(player);
        (table, scene, token, gm, player)
    }

    #[test]
    fn gm_moves_anything() {
        let (table, scene, token, gm, _) = fixture();
        assert!(can_move_token(&table, &scene, &token, gm));
    }

    #[test]
    fn player_needs_turn_and_active_scene() {
        let (table, mut scene, token, _, player) = fixture();
        // No initiative yet, so no turn to act on.
        assert!(!can_move_token(&table, &scene, &token, player));

        scene
            .add_entry("Brynn", Some(token.id), Utc::now())
            .unwrap();
        scene.advance_turn(Utc::now()).unwrap();
        assert!(can_move_token(&table, &scene, &token, player));
    }

    #[test]
    fn player_cannot_move_on_background_scene() {
        let (mut table, mut scene, token, _, player) = fixture();
        scene
            .add_entry("Brynn", Some(token.id), Utc::now())
            .unwrap();
        scene.advance_turn(Utc::now()).unwrap();

        let backdrop = Scene::new(table.id, "Backdrop");
        table.add_scene(backdrop.id, Utc::now());
        table.set_active_scene(backdrop.id, Utc::now()).unwrap();
        assert!(!can_move_token(&table, &scene, &token, player));
    }

    #[test]
    fn player_cannot_move_someone_elses_token() {
        let (table, mut scene, mut token, _, player) = fixture();
        token.owner = Some(UserId::new());
        scene
            .add_entry("Brynn", Some(token.id), Utc::now())
            .unwrap();
        scene.advance_turn(Utc::now()).unwrap();
        assert!(!can_move_token(&table, &scene, &token, player));
    }

    #[test]
    fn turn_owner_follows_the_current_entry() {
        let (_, mut scene, token, _, player) = fixture();
        let tokens = vec![token.clone()];
        assert_eq!(turn_owner(&scene, &tokens), None);

        scene
            .add_entry("Brynn", Some(token.id), Utc::now())
            .unwrap();
        scene.add_entry("Wolf", None, Utc::now()).unwrap();
        scene.advance_turn(Utc::now()).unwrap();
        assert_eq!(turn_owner(&scene, &tokens), Some(player));

        // The wolf entry has no token, so the turn has no owner.
        scene.advance_turn(Utc::now()).unwrap();
        assert_eq!(turn_owner(&scene, &tokens), None);
    }

    #[test]
    fn measurement_rights_follow_the_turn() {
        let (table, _, _, gm, player) = fixture();
        assert!(can_share_measurement(&table, None, gm));
        assert!(!can_share_measurement(&table, None, player));
        assert!(can_share_measurement(&table, Some(player), player));
    }

    #[test]
    fn aura_rights_include_the_token_owner() {
        let (table, _, token, _, player) = fixture();
        let stranger = UserId::new();
        assert!(can_upsert_aura(&table, &token, None, player));
        assert!(!can_upsert_aura(&table, &token, None, stranger));
        assert!(can_upsert_aura(&table, &token, Some(stranger), stranger));
    }

    #[test]
    fn stranger_gets_nothing() {
        let (table, scene, token, _, _) = fixture();
        let stranger = UserId::new();
        assert!(!can_move_token(&table, &scene, &token, stranger));
        assert!(!can_share_measurement(&table, None, stranger));
    }
}
