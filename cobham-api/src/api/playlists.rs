//! Playlist endpoints (all require authentication)

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Router,
};
use cobham_common::{api::ApiResponse, time};
use uuid::Uuid;

use super::authenticated;
use crate::db::playlists::{self, Playlist};
use crate::db::songs;
use crate::dto::PlaylistDto;
use crate::error::{ApiResult, AppError};
use crate::identity::AuthUser;
use crate::services::profiles;
use crate::storage::{folders, Bucket};
use crate::upload::FormInput;
use crate::validation;
use crate::AppState;

async fn playlist_dto(state: &AppState, playlist: Playlist) -> ApiResult<PlaylistDto> {
    let tracks = songs::list_by_playlist(&state.db, playlist.id).await?;
    Ok(PlaylistDto::build(&state.storage, playlist, tracks).await)
}

async fn find_playlist(state: &AppState, id: Uuid) -> ApiResult<Playlist> {
    playlists::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))
}

/// Load a playlist the caller owns
async fn owned_playlist(state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Playlist> {
    let id = validation::uuid(id, "playlist id")?;
    let playlist = find_playlist(state, id).await?;
    if playlist.user_id != user.id {
        return Err(AppError::forbidden());
    }
    Ok(playlist)
}

/// POST /api/playlists
pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: FormInput,
) -> ApiResult<ApiResponse<PlaylistDto>> {
    form.allow_files(&[])?;
    validation::require_fields(&[("title", form.text("title"))])?;
    profiles::require_user(&state, user.id).await?;

    let mut playlist = Playlist::new(form.text("title").unwrap_or_default().to_string(), user.id);
    playlist.description = form.text("description").map(str::to_string);
    playlist.is_private = form.flag("isPrivate");
    playlists::insert(&state.db, &playlist).await?;

    tracing::info!(playlist_id = %playlist.id, user_id = %user.id, "Created playlist");
    Ok(ApiResponse::created(playlist_dto(&state, playlist).await?))
}

/// GET /api/playlists
pub async fn list_playlists(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<PlaylistDto>>> {
    let mut dtos = Vec::new();
    for playlist in playlists::list_by_user(&state.db, user.id).await? {
        dtos.push(playlist_dto(&state, playlist).await?);
    }
    Ok(ApiResponse::ok(dtos))
}

/// GET /api/playlists/:id
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<PlaylistDto>> {
    let id = validation::uuid(&id, "playlist id")?;
    let playlist = find_playlist(&state, id).await?;

    if playlist.is_private && playlist.user_id != user.id {
        return Err(AppError::forbidden());
    }
    Ok(ApiResponse::ok(playlist_dto(&state, playlist).await?))
}

/// POST /api/playlists/:id/songs/:song_id
pub async fn add_song(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, song_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<PlaylistDto>> {
    let playlist = owned_playlist(&state, &user, &id).await?;
    let song_id = validation::uuid(&song_id, "song id")?;

    if !songs::exists(&state.db, song_id).await? {
        return Err(AppError::NotFound("Song not found.".to_string()));
    }

    if playlists::add_song(&state.db, playlist.id, song_id).await? {
        tracing::debug!(playlist_id = %playlist.id, song_id = %song_id, "Added song to playlist");
    }

    Ok(ApiResponse::with_message(
        playlist_dto(&state, playlist).await?,
        "Song added to playlist.",
    ))
}

/// DELETE /api/playlists/:id/songs/:song_id
pub async fn remove_song(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, song_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<PlaylistDto>> {
    let playlist = owned_playlist(&state, &user, &id).await?;
    let song_id = validation::uuid(&song_id, "song id")?;

    playlists::remove_song(&state.db, playlist.id, song_id).await?;

    Ok(ApiResponse::with_message(
        playlist_dto(&state, playlist).await?,
        "Song removed from playlist.",
    ))
}

/// PATCH|PUT /api/playlists/:id
pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    form: FormInput,
) -> ApiResult<ApiResponse<PlaylistDto>> {
    form.allow_files(&["cover"])?;
    let mut playlist = owned_playlist(&state, &user, &id).await?;

    if let Some(title) = form.text("title") {
        playlist.title = title.to_string();
    }
    if form.raw("description").is_some() {
        playlist.description = form.text("description").map(str::to_string);
    }
    if form.raw("isPrivate").is_some() {
        playlist.is_private = form.flag("isPrivate");
    }

    if let Some(cover) = form.file("cover") {
        let path = format!("{}/{}-{}", folders::PLAYLISTS, playlist.id, time::now_millis());
        let stored = state.storage.upload(Bucket::Artwork, &path, cover).await?;
        state
            .storage
            .delete(Bucket::Artwork, playlist.cover_url.as_deref())
            .await;
        playlist.cover_url = Some(stored);
    } else if form.flag("removeCover") {
        state
            .storage
            .delete(Bucket::Artwork, playlist.cover_url.as_deref())
            .await;
        playlist.cover_url = None;
    }

    playlists::update(&state.db, &mut playlist).await?;

    Ok(ApiResponse::with_message(
        playlist_dto(&state, playlist).await?,
        "Playlist updated successfully.",
    ))
}

/// DELETE /api/playlists/:id
pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let playlist = owned_playlist(&state, &user, &id).await?;

    playlists::delete(&state.db, playlist.id).await?;
    state
        .storage
        .delete(Bucket::Artwork, playlist.cover_url.as_deref())
        .await;

    tracing::info!(playlist_id = %playlist.id, "Deleted playlist");
    Ok(ApiResponse::message("Playlist deleted successfully."))
}

pub fn playlist_routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/api/playlists", post(create_playlist).get(list_playlists))
            .route(
                "/api/playlists/:id",
                get(get_playlist)
                    .patch(update_playlist)
                    .put(update_playlist)
                    .delete(delete_playlist),
            )
            .route(
                "/api/playlists/:id/songs/:song_id",
                post(add_song).delete(remove_song),
            ),
    )
}
