//! User profiles
//!
//! Profiles are cached for five minutes under `profile:<id>`; every write
//! path invalidates the entry.

use cobham_common::sanitize::unescape_html;
use cobham_common::time;
use uuid::Uuid;

use crate::db::{subscriptions, users, users::User};
use crate::dto::UserDto;
use crate::error::{ApiResult, AppError};
use crate::identity::AuthUser;
use crate::storage::{folders, Bucket};
use crate::upload::FormInput;
use crate::validation;
use crate::AppState;

pub fn cache_key(id: Uuid) -> String {
    format!("profile:{}", id)
}

pub async fn invalidate(state: &AppState, id: Uuid) {
    state.profiles.remove(&cache_key(id)).await;
}

/// Load the user row or fail with 404
pub async fn require_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Profile with signed avatar and current subscription
pub async fn load(state: &AppState, id: Uuid) -> ApiResult<UserDto> {
    let key = cache_key(id);
    if let Some(profile) = state.profiles.get(&key).await {
        return Ok(profile);
    }

    let user = require_user(state, id).await?;
    let subscription = subscriptions::current_active(&state.db, id).await?;
    let profile = UserDto::build(&state.storage, user, subscription).await;

    state.profiles.set(key, profile.clone()).await;
    Ok(profile)
}

/// Fields sent by the client after signing in with the identity provider
#[derive(Debug, Default)]
pub struct SyncRequest {
    pub id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Create or refresh the local profile for the signed-in user
///
/// Returns the profile and whether it was newly created.
pub async fn sync(
    state: &AppState,
    caller: &AuthUser,
    request: SyncRequest,
) -> ApiResult<(UserDto, bool)> {
    validation::require_fields(&[
        ("id", request.id.as_deref()),
        ("email", request.email.as_deref()),
    ])?;
    let id = validation::uuid(request.id.as_deref().unwrap_or_default(), "user id")?;
    let email = request.email.as_deref().unwrap_or_default().trim().to_string();
    validation::email(&email)?;
    let avatar_url = request.avatar_url.as_deref().map(unescape_html);

    if id != caller.id {
        return Err(AppError::Forbidden(
            "Cannot sync profile for another user.".to_string(),
        ));
    }

    if let Some(owner) = users::find_by_email(&state.db, &email).await? {
        if owner.id != id {
            return Err(AppError::BadRequest(
                "This email is already linked to another account.".to_string(),
            ));
        }
    }

    let created = match users::find_by_id(&state.db, id).await? {
        Some(mut user) => {
            user.email = email;
            if user.full_name.is_none() {
                user.full_name = request.full_name;
            }
            if user.avatar_url.is_none() {
                user.avatar_url = avatar_url;
            }
            users::update(&state.db, &mut user).await?;
            false
        }
        None => {
            let mut user = User::new(id, email);
            user.full_name = request.full_name;
            user.avatar_url = avatar_url;
            users::insert(&state.db, &user).await?;
            tracing::info!(user_id = %id, "Created profile");
            true
        }
    };

    invalidate(state, id).await;
    Ok((load(state, id).await?, created))
}

/// Apply a profile edit form (`fullName`, `bio`, `removeAvatar`, file `avatar`)
pub async fn update(state: &AppState, caller: &AuthUser, form: FormInput) -> ApiResult<UserDto> {
    form.allow_files(&["avatar"])?;
    let mut user = require_user(state, caller.id).await?;

    if form.raw("fullName").is_some() {
        user.full_name = form.text("fullName").map(str::to_string);
    }
    if form.raw("bio").is_some() {
        user.bio = form.text("bio").map(str::to_string);
    }

    if let Some(avatar) = form.file("avatar") {
        let path = format!("{}/{}-{}", folders::AVATARS, user.id, time::now_millis());
        let stored = state.storage.upload(Bucket::Artwork, &path, avatar).await?;
        state
            .storage
            .delete(Bucket::Artwork, user.avatar_url.as_deref())
            .await;
        user.avatar_url = Some(stored);
    } else if form.flag("removeAvatar") {
        state
            .storage
            .delete(Bucket::Artwork, user.avatar_url.as_deref())
            .await;
        user.avatar_url = None;
    }

    users::update(&state.db, &mut user).await?;
    invalidate(state, user.id).await;
    // Song listings embed the artist name and avatar
    state.response_cache.clear("/api/songs").await;

    load(state, user.id).await
}
