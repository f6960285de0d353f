//! Bearer token authentication

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::AppState;

const MISSING_TOKEN: &str = "You are not authorized to access this resource.";

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verify the caller's access token and expose it as `Extension<AuthUser>`
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))?;

    let user = state.identity.verify(token).await?;
    debug!(user_id = %user.id, path = %request.uri().path(), "Authenticated request");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
