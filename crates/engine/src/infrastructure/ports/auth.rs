// Port traits carry the full contract - not every method has a caller yet
#![allow(dead_code)]

//! Credential verification port.
//!
//! The WebSocket handshake hands the bearer token to this port before any
//! event is processed. Production deployments can put a real identity
//! provider behind it; development runs on the env-seeded registry.

use async_trait::async_trait;
use gridhall_domain::UserId;

use super::error::AuthError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthPort: Send + Sync {
    /// Resolve a bearer token to the user it belongs to.
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}
