//! Dice rolls, announced to the whole table.

use std::sync::Arc;

use gridhall_domain::{CharacterId, DiceFormula, DiceRollResult, TableId, UserId};

use crate::infrastructure::ports::{CharacterRepo, RandomPort, TableRepo};
use crate::use_cases::ServiceError;

/// A resolved roll, together with the character it was rolled as.
#[derive(Debug)]
pub struct RolledDice {
    pub result: DiceRollResult,
    pub character_id: Option<CharacterId>,
}

pub struct DiceOps {
    tables: Arc<dyn TableRepo>,
    characters: Arc<dyn CharacterRepo>,
    random: Arc<dyn RandomPort>,
}

impl DiceOps {
    pub fn new(
        tables: Arc<dyn TableRepo>,
        characters: Arc<dyn CharacterRepo>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            tables,
            characters,
            random,
        }
    }

    /// Roll for the table. Rolling as a character requires it to be yours,
    /// unless you are the game master.
    pub async fn roll(
        &self,
        user_id: UserId,
        table_id: TableId,
        formula: &str,
        character_id: Option<CharacterId>,
    ) -> Result<RolledDice, ServiceError> {
        let table = self
            .tables
            .get(table_id)
            .await?
            .ok_or(ServiceError::NotFound("table"))?;
        if !table.is_member(user_id) {
            return Err(ServiceError::Forbidden("Only table members can roll dice"));
        }

        let parsed = DiceFormula::parse(formula)?;

        if let Some(character_id) = character_id {
            let character = self
                .characters
                .get(character_id)
                .await?
                .ok_or(ServiceError::NotFound("character"))?;
            if character.table_id != table_id {
                return Err(ServiceError::InvalidInput(
                    "Character belongs to a different table".into(),
                ));
            }
            if !table.is_game_master(user_id) && character.owner != user_id {
                return Err(ServiceError::Forbidden(
                    "You may only roll as your own character",
                ));
            }
        }

        let result = parsed.roll_with(|sides| self.random.roll_die(sides));
        Ok(RolledDice {
            result,
            character_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gridhall_domain::{Character, Table};

    use crate::infrastructure::clock::FixedRandom;
    use crate::infrastructure::memory::{MemoryCharacterRepo, MemoryTableRepo};

    struct Fixture {
        ops: DiceOps,
        tables: Arc<MemoryTableRepo>,
        characters: Arc<MemoryCharacterRepo>,
        gm: UserId,
        player: UserId,
    }

    async fn fixture() -> (Fixture, Table) {
        let tables = Arc::new(MemoryTableRepo::new());
        let characters = Arc::new(MemoryCharacterRepo::new());
        let ops = DiceOps::new(
            tables.clone(),
            characters.clone(),
            Arc::new(FixedRandom(4)),
        );
        let fx = Fixture {
            ops,
            tables,
            characters,
            gm: UserId::new(),
            player: UserId::new(),
        };
        let mut table = Table::new("Ruins of Vel", fx.gm, "RUIN1234");
        table.add_member(fx.player, Utc::now());
        fx.tables.save(&table).await.unwrap();
        (fx, table)
    }

    #[tokio::test]
    async fn formulas_resolve_under_the_injected_die() {
        let (fx, table) = fixture().await;

        // Every die lands on 4: 4d6kh3 keeps three of them.
        let rolled = fx
            .ops
            .roll(fx.player, table.id, "4d6kh3", None)
            .await
            .unwrap();
        assert_eq!(rolled.result.total, 12);
        assert_eq!(rolled.result.kept_rolls.len(), 3);
        assert_eq!(rolled.result.dropped_rolls.len(), 1);

        let rolled = fx.ops.roll(fx.player, table.id, "2d8+3", None).await.unwrap();
        assert_eq!(rolled.result.total, 11);
    }

    #[tokio::test]
    async fn garbage_formulas_are_rejected() {
        let (fx, table) = fixture().await;
        let err = fx
            .ops
            .roll(fx.player, table.id, "banana", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn only_members_roll() {
        let (fx, table) = fixture().await;
        let err = fx
            .ops
            .roll(UserId::new(), table.id, "1d20", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn character_attribution_is_checked() {
        let (fx, table) = fixture().await;
        let brynn = Character::new(table.id, fx.player, "Brynn Haleth");
        fx.characters.save(&brynn).await.unwrap();

        // The owner and the game master may roll as Brynn.
        let rolled = fx
            .ops
            .roll(fx.player, table.id, "1d20", Some(brynn.id))
            .await
            .unwrap();
        assert_eq!(rolled.character_id, Some(brynn.id));
        fx.ops
            .roll(fx.gm, table.id, "1d20", Some(brynn.id))
            .await
            .unwrap();

        // Another member may not.
        let mut table_stored = fx.tables.get(table.id).await.unwrap().unwrap();
        let rival = UserId::new();
        table_stored.add_member(rival, Utc::now());
        fx.tables.save(&table_stored).await.unwrap();
        let err = fx
            .ops
            .roll(rival, table.id, "1d20", Some(brynn.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // A character from another table is no use here.
        let foreign = Character::new(TableId::new(), fx.player, "Elsewhere");
        fx.characters.save(&foreign).await.unwrap();
        let err = fx
            .ops
            .roll(fx.player, table.id, "1d20", Some(foreign.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = fx
            .ops
            .roll(fx.player, table.id, "1d20", Some(CharacterId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("character")));
    }
}
