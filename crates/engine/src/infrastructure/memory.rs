//! In-memory document store.
//!
//! The engine is the single authority for live session state, so plain maps
//! behind async locks are enough for the durable entities. Everything hides
//! behind the repo ports; swapping in a database later touches nothing above
//! this module.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use gridhall_domain::{
    Character, CharacterId, Scene, SceneId, Table, TableId, Token, TokenId,
};

use super::ports::{CharacterRepo, RepoError, SceneRepo, TableRepo, TokenRepo};

// =============================================================================
// Tables
// =============================================================================

#[derive(Default)]
pub struct MemoryTableRepo {
    tables: RwLock<HashMap<TableId, Table>>,
}

impl MemoryTableRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableRepo for MemoryTableRepo {
    async fn get(&self, id: TableId) -> Result<Option<Table>, RepoError> {
        Ok(self.tables.read().await.get(&id).cloned())
    }

    async fn save(&self, table: &Table) -> Result<(), RepoError> {
        self.tables.write().await.insert(table.id, table.clone());
        Ok(())
    }

    async fn delete(&self, id: TableId) -> Result<(), RepoError> {
        self.tables.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Table>, RepoError> {
        let mut tables: Vec<Table> = self.tables.read().await.values().cloned().collect();
        tables.sort_by_key(|t| t.created_at);
        Ok(tables)
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Table>, RepoError> {
        Ok(self
            .tables
            .read()
            .await
            .values()
            .find(|t| t.invite_code == code)
            .cloned())
    }
}

// =============================================================================
// Scenes
// =============================================================================

#[derive(Default)]
pub struct MemorySceneRepo {
    scenes: RwLock<HashMap<SceneId, Scene>>,
}

impl MemorySceneRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SceneRepo for MemorySceneRepo {
    async fn get(&self, id: SceneId) -> Result<Option<Scene>, RepoError> {
        Ok(self.scenes.read().await.get(&id).cloned())
    }

    async fn save(&self, scene: &Scene) -> Result<(), RepoError> {
        self.scenes.write().await.insert(scene.id, scene.clone());
        Ok(())
    }

    async fn delete(&self, id: SceneId) -> Result<(), RepoError> {
        self.scenes.write().await.remove(&id);
        Ok(())
    }

    async fn list_for_table(&self, table_id: TableId) -> Result<Vec<Scene>, RepoError> {
        let mut scenes: Vec<Scene> = self
            .scenes
            .read()
            .await
            .values()
            .filter(|s| s.table_id == table_id)
            .cloned()
            .collect();
        scenes.sort_by_key(|s| s.created_at);
        Ok(scenes)
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Default)]
pub struct MemoryTokenRepo {
    tokens: RwLock<HashMap<TokenId, Token>>,
}

impl MemoryTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepo for MemoryTokenRepo {
    async fn get(&self, id: TokenId) -> Result<Option<Token>, RepoError> {
        Ok(self.tokens.read().await.get(&id).cloned())
    }

    async fn save(&self, token: &Token) -> Result<(), RepoError> {
        self.tokens.write().await.insert(token.id, token.clone());
        Ok(())
    }

    async fn delete(&self, id: TokenId) -> Result<(), RepoError> {
        self.tokens.write().await.remove(&id);
        Ok(())
    }

    async fn list_for_scene(&self, scene_id: SceneId) -> Result<Vec<Token>, RepoError> {
        let mut tokens: Vec<Token> = self
            .tokens
            .read()
            .await
            .values()
            .filter(|t| t.scene_id == scene_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    async fn delete_for_scene(&self, scene_id: SceneId) -> Result<Vec<TokenId>, RepoError> {
        let mut tokens = self.tokens.write().await;
        let removed: Vec<TokenId> = tokens
            .values()
            .filter(|t| t.scene_id == scene_id)
            .map(|t| t.id)
            .collect();
        for id in &removed {
            tokens.remove(id);
        }
        Ok(removed)
    }
}

// =============================================================================
// Characters
// =============================================================================

#[derive(Default)]
pub struct MemoryCharacterRepo {
    characters: RwLock<HashMap<CharacterId, Character>>,
}

impl MemoryCharacterRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CharacterRepo for MemoryCharacterRepo {
    async fn get(&self, id: CharacterId) -> Result<Option<Character>, RepoError> {
        Ok(self.characters.read().await.get(&id).cloned())
    }

    async fn save(&self, character: &Character) -> Result<(), RepoError> {
        self.characters
            .write()
            .await
            .insert(character.id, character.clone());
        Ok(())
    }

    async fn delete(&self, id: CharacterId) -> Result<(), RepoError> {
        self.characters.write().await.remove(&id);
        Ok(())
    }

    async fn list_for_table(&self, table_id: TableId) -> Result<Vec<Character>, RepoError> {
        let mut characters: Vec<Character> = self
            .characters
            .read()
            .await
            .values()
            .filter(|c| c.table_id == table_id)
            .cloned()
            .collect();
        characters.sort_by_key(|c| c.created_at);
        Ok(characters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridhall_domain::{SquareId, TokenSize, UserId};

    #[tokio::test]
    async fn table_round_trip_and_invite_lookup() {
        let repo = MemoryTableRepo::new();
        let table = Table::new("Night Market", UserId::new(), "NM-42");
        repo.save(&table).await.unwrap();

        let loaded = repo.get(table.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Night Market");

        let by_code = repo.find_by_invite_code("NM-42").await.unwrap().unwrap();
        assert_eq!(by_code.id, table.id);
        assert!(repo.find_by_invite_code("nope").await.unwrap().is_none());

        repo.delete(table.id).await.unwrap();
        assert!(repo.get(table.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scenes_list_only_their_table() {
        let repo = MemorySceneRepo::new();
        let table_a = TableId::new();
        let table_b = TableId::new();
        repo.save(&Scene::new(table_a, "Docks")).await.unwrap();
        repo.save(&Scene::new(table_a, "Sewers")).await.unwrap();
        repo.save(&Scene::new(table_b, "Keep")).await.unwrap();

        let scenes = repo.list_for_table(table_a).await.unwrap();
        assert_eq!(scenes.len(), 2);
        assert!(scenes.iter().all(|s| s.table_id == table_a));
    }

    #[tokio::test]
    async fn delete_for_scene_reports_removed_tokens() {
        let repo = MemoryTokenRepo::new();
        let table_id = TableId::new();
        let scene_a = SceneId::new();
        let scene_b = SceneId::new();

        let on_a = Token::new(table_id, scene_a, "Goblin", SquareId::new(0), TokenSize::Medium, 30.0);
        let also_a =
            Token::new(table_id, scene_a, "Wolf", SquareId::new(5), TokenSize::Medium, 30.0);
        let on_b = Token::new(table_id, scene_b, "Ogre", SquareId::new(0), TokenSize::Large, 30.0);
        repo.save(&on_a).await.unwrap();
        repo.save(&also_a).await.unwrap();
        repo.save(&on_b).await.unwrap();

        let mut removed = repo.delete_for_scene(scene_a).await.unwrap();
        removed.sort_by_key(|id| id.to_string());
        let mut expected = vec![on_a.id, also_a.id];
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(removed, expected);

        assert!(repo.list_for_scene(scene_a).await.unwrap().is_empty());
        assert_eq!(repo.list_for_scene(scene_b).await.unwrap().len(), 1);
    }
}
