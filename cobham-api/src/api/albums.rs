//! Album endpoints (mounted under `/api/songs/albums`)

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Extension, Router,
};
use cobham_common::{api::ApiResponse, time};
use serde::Deserialize;

use super::songs::CATALOG_PREFIX;
use super::{authenticated, cached};
use crate::db::albums::{self, Album, AlbumWithArtist};
use crate::db::songs;
use crate::dto::AlbumDto;
use crate::error::{ApiResult, AppError};
use crate::extract::ApiJson;
use crate::identity::AuthUser;
use crate::services::profiles;
use crate::storage::{folders, Bucket};
use crate::upload::FormInput;
use crate::validation;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAlbumBody {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Albums with their tracks and signed artwork
pub(crate) async fn album_dtos(
    state: &AppState,
    rows: Vec<AlbumWithArtist>,
) -> ApiResult<Vec<AlbumDto>> {
    let mut dtos = Vec::with_capacity(rows.len());
    for row in rows {
        let tracks = songs::list_by_album(&state.db, row.album.id).await?;
        dtos.push(AlbumDto::build(&state.storage, row, tracks).await);
    }
    Ok(dtos)
}

async fn album_dto(state: &AppState, id: uuid::Uuid) -> ApiResult<AlbumDto> {
    let row = albums::find_with_artist(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Album not found".to_string()))?;
    let tracks = songs::list_by_album(&state.db, id).await?;
    Ok(AlbumDto::build(&state.storage, row, tracks).await)
}

/// POST /api/songs/albums
pub async fn create_album(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateAlbumBody>,
) -> ApiResult<ApiResponse<AlbumDto>> {
    validation::require_fields(&[("title", body.title.as_deref())])?;
    profiles::require_user(&state, user.id).await?;

    let description = body
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let album = Album::new(
        body.title.unwrap_or_default().trim().to_string(),
        user.id,
        description,
    );
    albums::insert(&state.db, &album).await?;
    state.response_cache.clear(CATALOG_PREFIX).await;

    tracing::info!(album_id = %album.id, artist_id = %user.id, "Created album");
    Ok(ApiResponse::created(album_dto(&state, album.id).await?))
}

/// GET /api/songs/albums
pub async fn list_albums(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<AlbumDto>>> {
    let rows = albums::list_all(&state.db).await?;
    Ok(ApiResponse::ok(album_dtos(&state, rows).await?))
}

/// GET /api/songs/albums/me
pub async fn my_albums(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<AlbumDto>>> {
    let rows = albums::list_by_artist(&state.db, user.id).await?;
    Ok(ApiResponse::ok(album_dtos(&state, rows).await?))
}

/// GET /api/songs/albums/artist/:id
pub async fn albums_by_artist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<AlbumDto>>> {
    let artist_id = validation::uuid(&id, "artist id")?;
    let rows = albums::list_by_artist(&state.db, artist_id).await?;
    Ok(ApiResponse::ok(album_dtos(&state, rows).await?))
}

/// GET /api/songs/albums/:id
pub async fn get_album(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<AlbumDto>> {
    let id = validation::uuid(&id, "album id")?;
    Ok(ApiResponse::ok(album_dto(&state, id).await?))
}

/// PATCH|PUT /api/songs/albums/:id
pub async fn update_album(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    form: FormInput,
) -> ApiResult<ApiResponse<AlbumDto>> {
    form.allow_files(&["cover"])?;
    let id = validation::uuid(&id, "album id")?;
    let mut album = albums::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Album not found".to_string()))?;

    if album.artist_id != user.id {
        return Err(AppError::Forbidden(
            "You do not have permission to update this album.".to_string(),
        ));
    }

    if let Some(title) = form.text("title") {
        album.title = title.to_string();
    }
    if form.raw("description").is_some() {
        album.description = form.text("description").map(str::to_string);
    }

    if let Some(cover) = form.file("cover") {
        let path = format!("{}/{}-{}", folders::ALBUMS, album.id, time::now_millis());
        let stored = state.storage.upload(Bucket::Artwork, &path, cover).await?;
        state
            .storage
            .delete(Bucket::Artwork, album.cover_url.as_deref())
            .await;
        album.cover_url = Some(stored);
    } else if form.flag("removeCover") {
        state
            .storage
            .delete(Bucket::Artwork, album.cover_url.as_deref())
            .await;
        album.cover_url = None;
    }

    albums::update(&state.db, &mut album).await?;
    state.response_cache.clear(CATALOG_PREFIX).await;

    Ok(ApiResponse::with_message(
        album_dto(&state, album.id).await?,
        "Album updated.",
    ))
}

/// DELETE /api/songs/albums/:id
pub async fn delete_album(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = validation::uuid(&id, "album id")?;
    let album = albums::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Album not found".to_string()))?;

    if album.artist_id != user.id {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this album.".to_string(),
        ));
    }

    albums::delete(&state.db, id).await?;
    state
        .storage
        .delete(Bucket::Artwork, album.cover_url.as_deref())
        .await;
    state.response_cache.clear(CATALOG_PREFIX).await;

    tracing::info!(album_id = %id, "Deleted album");
    Ok(ApiResponse::message("Album deleted."))
}

pub fn album_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/songs/albums", cached(state, 60, get(list_albums)))
        .route("/api/songs/albums/artist/:id", cached(state, 30, get(albums_by_artist)))
        .route("/api/songs/albums/:id", cached(state, 60, get(get_album)));

    let protected = authenticated(
        state,
        Router::new()
            .route("/api/songs/albums", post(create_album))
            .route("/api/songs/albums/me", cached(state, 30, get(my_albums)))
            .route(
                "/api/songs/albums/:id",
                patch(update_album)
                    .put(update_album)
                    .delete(delete_album),
            ),
    );

    public.merge(protected)
}
