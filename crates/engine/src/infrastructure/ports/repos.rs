// Port traits carry the full contract - not every method has a caller yet
#![allow(dead_code)]

//! Repository port traits for the document store.

use async_trait::async_trait;
use gridhall_domain::{
    Character, CharacterId, Scene, SceneId, Table, TableId, Token, TokenId,
};

use super::error::RepoError;

// =============================================================================
// Document Store Ports (one per entity type)
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TableRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: TableId) -> Result<Option<Table>, RepoError>;
    async fn save(&self, table: &Table) -> Result<(), RepoError>;
    async fn delete(&self, id: TableId) -> Result<(), RepoError>;

    // Queries
    async fn list(&self) -> Result<Vec<Table>, RepoError>;
    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Table>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SceneRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: SceneId) -> Result<Option<Scene>, RepoError>;
    async fn save(&self, scene: &Scene) -> Result<(), RepoError>;
    async fn delete(&self, id: SceneId) -> Result<(), RepoError>;

    // Queries
    async fn list_for_table(&self, table_id: TableId) -> Result<Vec<Scene>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: TokenId) -> Result<Option<Token>, RepoError>;
    async fn save(&self, token: &Token) -> Result<(), RepoError>;
    async fn delete(&self, id: TokenId) -> Result<(), RepoError>;

    // Queries
    async fn list_for_scene(&self, scene_id: SceneId) -> Result<Vec<Token>, RepoError>;

    /// Drop every token on a scene, returning the removed ids so callers can
    /// broadcast the removals.
    async fn delete_for_scene(&self, scene_id: SceneId) -> Result<Vec<TokenId>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: CharacterId) -> Result<Option<Character>, RepoError>;
    async fn save(&self, character: &Character) -> Result<(), RepoError>;
    async fn delete(&self, id: CharacterId) -> Result<(), RepoError>;

    // Queries
    async fn list_for_table(&self, table_id: TableId) -> Result<Vec<Character>, RepoError>;
}
