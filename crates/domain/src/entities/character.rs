//! Character entity - a player-owned persona that tokens can represent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CharacterId, TableId, UserId};

/// A character sheet stub. Tokens link to a character through
/// `character_id`; ownership of the character flows to the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub table_id: TableId,
    pub owner: UserId,
    pub name: String,
    pub avatar_asset: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    pub fn new(table_id: TableId, owner: UserId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CharacterId::new(),
            table_id,
            owner,
            name: name.into(),
            avatar_asset: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_avatar(mut self, asset: impl Into<String>) -> Self {
        self.avatar_asset = Some(asset.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_character_belongs_to_its_owner() {
        let owner = UserId::new();
        let character = Character::new(TableId::new(), owner, "Seraphine");

        assert_eq!(character.owner, owner);
        assert_eq!(character.name, "Seraphine");
        assert!(character.avatar_asset.is_none());
    }

    #[test]
    fn with_avatar_sets_the_asset() {
        let character =
            Character::new(TableId::new(), UserId::new(), "Seraphine").with_avatar("seraphine.png");

        assert_eq!(character.avatar_asset.as_deref(), Some("seraphine.png"));
    }
}
