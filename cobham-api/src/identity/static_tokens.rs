//! Fixed token table for local development and tests

use async_trait::async_trait;
use cobham_common::config::StaticToken;
use std::collections::HashMap;
use uuid::Uuid;

use super::{AuthUser, IdentityError, IdentityProvider};

#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, AuthUser>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(tokens: &[StaticToken]) -> Self {
        tokens.iter().fold(Self::new(), |identity, t| {
            identity.with_token(&t.token, t.user_id, Some(t.email.clone()))
        })
    }

    pub fn with_token(mut self, token: &str, id: Uuid, email: Option<String>) -> Self {
        self.tokens.insert(token.to_string(), AuthUser { id, email });
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify(&self, token: &str) -> Result<AuthUser, IdentityError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }
}
