//! Profile endpoints
//!
//! Sign-up and sign-in happen at the identity provider; these routes keep
//! the local profile row in step with it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Router,
};
use cobham_common::api::ApiResponse;
use serde::Deserialize;

use super::authenticated;
use crate::dto::UserDto;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::identity::AuthUser;
use crate::services::profiles::{self, SyncRequest};
use crate::upload::FormInput;
use crate::validation;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBody {
    pub id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// POST /api/auth/sync
pub async fn sync_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<SyncBody>,
) -> ApiResult<ApiResponse<UserDto>> {
    let request = SyncRequest {
        id: body.id,
        email: body.email,
        full_name: body.full_name,
        avatar_url: body.avatar_url,
    };

    let (profile, created) = profiles::sync(&state, &user, request).await?;
    Ok(if created {
        ApiResponse::with_message(profile, "Profile created successfully.")
            .with_status(StatusCode::CREATED)
    } else {
        ApiResponse::with_message(profile, "Profile synced successfully.")
    })
}

/// GET /api/auth/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<UserDto>> {
    Ok(ApiResponse::ok(profiles::load(&state, user.id).await?))
}

/// GET /api/auth/profile/:id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<UserDto>> {
    let id = validation::uuid(&id, "user id")?;
    Ok(ApiResponse::ok(profiles::load(&state, id).await?))
}

/// PUT /api/auth/update
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: FormInput,
) -> ApiResult<ApiResponse<UserDto>> {
    let profile = profiles::update(&state, &user, form).await?;
    Ok(ApiResponse::with_message(profile, "Profile updated successfully."))
}

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/api/auth/sync", post(sync_profile))
            .route("/api/auth/me", get(get_me))
            .route("/api/auth/profile/:id", get(get_profile))
            .route("/api/auth/update", put(update_profile)),
    )
}
