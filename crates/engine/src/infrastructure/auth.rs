//! Development bearer-token registry.
//!
//! Seeded from `GRIDHALL_AUTH_TOKENS`, a comma-separated list of
//! `token=user-uuid` pairs. An empty registry authenticates nobody; the seed
//! list is how a development table gets its users.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use gridhall_domain::UserId;

use super::ports::{AuthError, AuthPort};

pub struct BearerRegistry {
    tokens: HashMap<String, UserId>,
}

impl BearerRegistry {
    /// Parse the seed list. Malformed entries are skipped with a warning so
    /// one typo does not lock every other user out.
    pub fn from_spec(spec: &str) -> Self {
        let mut tokens = HashMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((token, user)) if !token.trim().is_empty() => {
                    match user.trim().parse::<Uuid>() {
                        Ok(uuid) => {
                            tokens.insert(token.trim().to_string(), UserId::from_uuid(uuid));
                        }
                        Err(_) => {
                            tracing::warn!(entry, "Skipping credential with a malformed user id");
                        }
                    }
                }
                _ => {
                    tracing::warn!(entry, "Skipping malformed credential, expected token=user-uuid");
                }
            }
        }
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthPort for BearerRegistry {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or(AuthError::UnknownToken)
    }
}
