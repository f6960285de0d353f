//! Song endpoints

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Extension, Router,
};
use cobham_common::{api::ApiResponse, time};
use uuid::Uuid;

use super::{authenticated, cached};
use crate::db::{albums, songs, songs::Song, users};
use crate::dto::{ArtistDto, SongDto};
use crate::error::{ApiResult, AppError};
use crate::identity::AuthUser;
use crate::services::profiles;
use crate::storage::{folders, Bucket};
use crate::upload::{FormInput, UploadedFile};
use crate::validation;
use crate::AppState;

/// Prefix cleared from the response cache after catalog writes
pub const CATALOG_PREFIX: &str = "/api/songs";

/// Validate an `albumId` field: must name an album owned by the caller
pub(crate) async fn owned_album(state: &AppState, user: &AuthUser, raw: &str) -> ApiResult<Uuid> {
    let album_id = validation::uuid(raw, "album id")?;
    let album = albums::find_by_id(&state.db, album_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Album not found".to_string()))?;

    if album.artist_id != user.id {
        return Err(AppError::Forbidden(
            "You do not have permission to add songs to this album.".to_string(),
        ));
    }
    Ok(album_id)
}

/// Seconds from a form value; anything unparsable counts as zero
fn parse_duration(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.trunc() as i64)
        .unwrap_or(0)
}

async fn store_media(
    state: &AppState,
    bucket: Bucket,
    folder: &str,
    file: &UploadedFile,
) -> ApiResult<String> {
    let path = format!("{}/{}-{}", folder, time::now_millis(), file.file_name);
    Ok(state.storage.upload(bucket, &path, file).await?)
}

async fn song_dto(state: &AppState, id: Uuid) -> ApiResult<SongDto> {
    let row = songs::find_with_artist(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Song not found".to_string()))?;
    Ok(SongDto::build(&state.storage, row).await)
}

/// POST /api/songs/upload
pub async fn upload_song(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: FormInput,
) -> ApiResult<ApiResponse<SongDto>> {
    form.allow_files(&["audio", "cover"])?;
    validation::require_fields(&[("title", form.text("title"))])?;

    if let Some(artist_id) = form.text("artistId") {
        if validation::uuid(artist_id, "artist id")? != user.id {
            return Err(AppError::Forbidden(
                "You can only upload songs as yourself.".to_string(),
            ));
        }
    }

    let audio = form
        .file("audio")
        .ok_or_else(|| AppError::BadRequest("Audio file is required.".to_string()))?;

    profiles::require_user(&state, user.id).await?;
    let album_id = match form.text("albumId") {
        Some(raw) => Some(owned_album(&state, &user, raw).await?),
        None => None,
    };

    let audio_path = store_media(&state, Bucket::Audio, folders::AUDIO, audio).await?;
    let cover_path = match form.file("cover") {
        Some(cover) => match store_media(&state, Bucket::Artwork, folders::ARTWORK, cover).await {
            Ok(path) => Some(path),
            Err(e) => {
                state.storage.delete(Bucket::Audio, Some(&audio_path)).await;
                return Err(e);
            }
        },
        None => None,
    };

    let mut song = Song::new(
        form.text("title").unwrap_or_default().to_string(),
        user.id,
        audio_path,
    );
    song.artist_name = form.text("artistName").map(str::to_string);
    song.album_id = album_id;
    song.cover_url = cover_path;
    song.duration = parse_duration(form.text("duration"));
    song.genre = form.text("genre").map(str::to_string);

    if let Err(e) = songs::insert(&state.db, &song).await {
        state.storage.delete(Bucket::Audio, Some(&song.audio_url)).await;
        state.storage.delete(Bucket::Artwork, song.cover_url.as_deref()).await;
        return Err(e.into());
    }

    tracing::info!(song_id = %song.id, artist_id = %user.id, "Uploaded song");
    state.response_cache.clear(CATALOG_PREFIX).await;

    Ok(ApiResponse::created(song_dto(&state, song.id).await?))
}

/// GET /api/songs
pub async fn list_songs(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<SongDto>>> {
    let rows = songs::list_all(&state.db).await?;
    Ok(ApiResponse::ok(SongDto::build_all(&state.storage, rows).await))
}

/// GET /api/songs/me
pub async fn my_songs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<SongDto>>> {
    let rows = songs::list_by_artist(&state.db, user.id).await?;
    Ok(ApiResponse::ok(SongDto::build_all(&state.storage, rows).await))
}

/// GET /api/songs/artist/:id
pub async fn songs_by_artist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<SongDto>>> {
    let artist_id = validation::uuid(&id, "artist id")?;
    let rows = songs::list_by_artist(&state.db, artist_id).await?;
    Ok(ApiResponse::ok(SongDto::build_all(&state.storage, rows).await))
}

/// GET /api/songs/artist-profile/:id
pub async fn artist_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<ArtistDto>> {
    let artist_id = validation::uuid(&id, "artist id")?;
    let user = users::find_by_id(&state.db, artist_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Artist not found".to_string()))?;
    Ok(ApiResponse::ok(ArtistDto::build(&state.storage, user).await))
}

/// GET /api/songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<SongDto>> {
    let id = validation::uuid(&id, "song id")?;
    Ok(ApiResponse::ok(song_dto(&state, id).await?))
}

/// PATCH /api/songs/:id
pub async fn update_song(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    form: FormInput,
) -> ApiResult<ApiResponse<SongDto>> {
    form.allow_files(&["cover"])?;
    let id = validation::uuid(&id, "song id")?;
    let mut song = songs::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Song not found".to_string()))?;

    if song.artist_id != user.id {
        return Err(AppError::Forbidden(
            "You do not have permission to edit this song.".to_string(),
        ));
    }

    if let Some(title) = form.text("title") {
        song.title = title.to_string();
    }
    if form.raw("genre").is_some() {
        song.genre = form.text("genre").map(str::to_string);
    }
    if form.raw("artistName").is_some() {
        song.artist_name = form.text("artistName").map(str::to_string);
    }
    if form.raw("albumId").is_some() {
        song.album_id = match form.text("albumId") {
            Some(raw) => Some(owned_album(&state, &user, raw).await?),
            None => None,
        };
    }

    if let Some(cover) = form.file("cover") {
        let stored = store_media(&state, Bucket::Artwork, folders::ARTWORK, cover).await?;
        state
            .storage
            .delete(Bucket::Artwork, song.cover_url.as_deref())
            .await;
        song.cover_url = Some(stored);
    } else if form.flag("removeCover") {
        state
            .storage
            .delete(Bucket::Artwork, song.cover_url.as_deref())
            .await;
        song.cover_url = None;
    }

    songs::update(&state.db, &mut song).await?;
    state.response_cache.clear(CATALOG_PREFIX).await;

    Ok(ApiResponse::with_message(
        song_dto(&state, song.id).await?,
        "Song updated successfully.",
    ))
}

/// DELETE /api/songs/:id
pub async fn delete_song(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = validation::uuid(&id, "song id")?;
    let song = songs::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Song not found".to_string()))?;

    if song.artist_id != user.id {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this song.".to_string(),
        ));
    }

    songs::delete(&state.db, id).await?;
    state.storage.delete(Bucket::Audio, Some(&song.audio_url)).await;
    state
        .storage
        .delete(Bucket::Artwork, song.cover_url.as_deref())
        .await;
    state.response_cache.clear(CATALOG_PREFIX).await;

    tracing::info!(song_id = %id, "Deleted song");
    Ok(ApiResponse::message("Song deleted successfully."))
}

pub fn song_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/songs", cached(state, 120, get(list_songs)))
        .route("/api/songs/artist/:id", cached(state, 30, get(songs_by_artist)))
        .route("/api/songs/artist-profile/:id", cached(state, 60, get(artist_profile)))
        .route("/api/songs/:id", cached(state, 60, get(get_song)));

    let protected = authenticated(
        state,
        Router::new()
            .route("/api/songs/upload", post(upload_song))
            .route("/api/songs/me", cached(state, 30, get(my_songs)))
            .route("/api/songs/:id", patch(update_song).delete(delete_song)),
    );

    public.merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(Some("215")), 215);
        assert_eq!(parse_duration(Some("215.9")), 215);
        assert_eq!(parse_duration(Some("abc")), 0);
        assert_eq!(parse_duration(Some("-3")), 0);
        assert_eq!(parse_duration(None), 0);
    }
}
