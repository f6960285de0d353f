//! Favorite songs and albums

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Router,
};
use cobham_common::api::ApiResponse;

use super::albums::album_dtos;
use super::authenticated;
use crate::db::{albums, favorites, songs};
use crate::dto::{AlbumDto, FavoriteToggle, SongDto};
use crate::error::{ApiResult, AppError};
use crate::identity::AuthUser;
use crate::services::profiles;
use crate::validation;
use crate::AppState;

fn toggled(is_favorite: bool) -> FavoriteToggle {
    let message = if is_favorite {
        "Added to favorites."
    } else {
        "Removed from favorites."
    };
    FavoriteToggle {
        is_favorite,
        message: message.to_string(),
    }
}

/// POST /api/favorites/:song_id
pub async fn toggle_song(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(song_id): Path<String>,
) -> ApiResult<ApiResponse<FavoriteToggle>> {
    let song_id = validation::uuid(&song_id, "song id")?;
    profiles::require_user(&state, user.id).await?;
    if !songs::exists(&state.db, song_id).await? {
        return Err(AppError::NotFound("Song not found".to_string()));
    }

    let result = toggled(favorites::toggle_song(&state.db, user.id, song_id).await?);
    tracing::debug!(user_id = %user.id, song_id = %song_id, favorite = result.is_favorite, "Toggled song favorite");

    let message = result.message.clone();
    Ok(ApiResponse::with_message(result, message))
}

/// GET /api/favorites
pub async fn list_songs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<SongDto>>> {
    let rows = favorites::list_songs(&state.db, user.id).await?;
    Ok(ApiResponse::ok(SongDto::build_all(&state.storage, rows).await))
}

/// POST /api/favorites/albums/:album_id
pub async fn toggle_album(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(album_id): Path<String>,
) -> ApiResult<ApiResponse<FavoriteToggle>> {
    let album_id = validation::uuid(&album_id, "album id")?;
    profiles::require_user(&state, user.id).await?;
    if !albums::exists(&state.db, album_id).await? {
        return Err(AppError::NotFound("Album not found".to_string()));
    }

    let result = toggled(favorites::toggle_album(&state.db, user.id, album_id).await?);
    tracing::debug!(user_id = %user.id, album_id = %album_id, favorite = result.is_favorite, "Toggled album favorite");

    let message = result.message.clone();
    Ok(ApiResponse::with_message(result, message))
}

/// GET /api/favorites/albums
pub async fn list_albums(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<AlbumDto>>> {
    let rows = favorites::list_albums(&state.db, user.id).await?;
    Ok(ApiResponse::ok(album_dtos(&state, rows).await?))
}

pub fn favorite_routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/api/favorites", get(list_songs))
            .route("/api/favorites/albums", get(list_albums))
            .route("/api/favorites/albums/:album_id", post(toggle_album))
            .route("/api/favorites/:song_id", post(toggle_song)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_messages() {
        assert_eq!(toggled(true).message, "Added to favorites.");
        assert_eq!(toggled(false).message, "Removed from favorites.");
    }
}
