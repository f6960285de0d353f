//! Supabase Auth token verification
//!
//! Calls `GET {url}/auth/v1/user` with the caller's access token.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{AuthUser, IdentityError, IdentityProvider};

const USER_AGENT: &str = concat!("cobham-api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

pub struct SupabaseIdentity {
    http_client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseIdentity {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, IdentityError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn verify(&self, token: &str) -> Result<AuthUser, IdentityError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            debug!("Identity provider rejected token ({})", status);
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!(
                "GET /auth/v1/user returned {}",
                status
            )));
        }

        let user: SupabaseUser = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Invalid user payload: {}", e)))?;

        let id = Uuid::parse_str(&user.id).map_err(|_| IdentityError::InvalidToken)?;

        Ok(AuthUser {
            id,
            email: user.email,
        })
    }
}
