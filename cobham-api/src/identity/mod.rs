//! Bearer-token identity verification
//!
//! Sign-in happens against the identity provider directly; the API only
//! verifies the access token each request carries.

mod static_tokens;
mod supabase;

pub use static_tokens::StaticIdentity;
pub use supabase::SupabaseIdentity;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Caller resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider rejected the token
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The provider could not be reached or answered unexpectedly
    #[error("Identity provider error: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, IdentityError>;
}
