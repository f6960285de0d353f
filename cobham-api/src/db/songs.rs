//! Song persistence

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_opt_uuid, get_time, get_uuid};

#[derive(Debug, Clone)]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub artist_id: Uuid,
    /// Display name chosen at upload; falls back to the artist's profile name
    pub artist_name: Option<String>,
    pub album_id: Option<Uuid>,
    /// Object path in the audio bucket
    pub audio_url: String,
    /// Object path in the artwork bucket
    pub cover_url: Option<String>,
    /// Length in seconds
    pub duration: i64,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Song joined with the uploading user's profile
#[derive(Debug, Clone)]
pub struct SongWithArtist {
    pub song: Song,
    pub artist_full_name: Option<String>,
    pub artist_avatar_url: Option<String>,
}

impl Song {
    pub fn new(title: String, artist_id: Uuid, audio_url: String) -> Self {
        let now = time::now();
        Self {
            id: uuid_utils::generate(),
            title,
            artist_id,
            artist_name: None,
            album_id: None,
            audio_url,
            cover_url: None,
            duration: 0,
            genre: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            artist_id: get_uuid(row, "artist_id")?,
            artist_name: row.try_get("artist_name")?,
            album_id: get_opt_uuid(row, "album_id")?,
            audio_url: row.try_get("audio_url")?,
            cover_url: row.try_get("cover_url")?,
            duration: row.try_get("duration")?,
            genre: row.try_get("genre")?,
            created_at: get_time(row, "created_at")?,
            updated_at: get_time(row, "updated_at")?,
        })
    }
}

impl SongWithArtist {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            song: Song::from_row(row)?,
            artist_full_name: row.try_get("artist_full_name")?,
            artist_avatar_url: row.try_get("artist_avatar_url")?,
        })
    }
}

/// Column list for queries joining `songs s` with `users u`
pub(crate) const SONG_COLUMNS: &str = r#"
    s.id, s.title, s.artist_id, s.artist_name, s.album_id, s.audio_url, s.cover_url,
    s.duration, s.genre, s.created_at, s.updated_at,
    u.full_name AS artist_full_name, u.avatar_url AS artist_avatar_url
"#;

fn select_songs(clause: &str) -> String {
    format!(
        "SELECT {} FROM songs s JOIN users u ON u.id = s.artist_id {}",
        SONG_COLUMNS, clause
    )
}

fn collect(rows: Vec<SqliteRow>) -> Result<Vec<SongWithArtist>> {
    rows.iter().map(SongWithArtist::from_row).collect()
}

pub async fn insert(pool: &SqlitePool, song: &Song) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO songs (
            id, title, artist_id, artist_name, album_id, audio_url, cover_url,
            duration, genre, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(song.id.to_string())
    .bind(&song.title)
    .bind(song.artist_id.to_string())
    .bind(&song.artist_name)
    .bind(song.album_id.map(|id| id.to_string()))
    .bind(&song.audio_url)
    .bind(&song.cover_url)
    .bind(song.duration)
    .bind(&song.genre)
    .bind(time::to_db(&song.created_at))
    .bind(time::to_db(&song.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Song>> {
    let row = sqlx::query("SELECT * FROM songs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Song::from_row).transpose()
}

pub async fn exists(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM songs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

pub async fn find_with_artist(pool: &SqlitePool, id: Uuid) -> Result<Option<SongWithArtist>> {
    let row = sqlx::query(&select_songs("WHERE s.id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(SongWithArtist::from_row).transpose()
}

/// All songs, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<SongWithArtist>> {
    let rows = sqlx::query(&select_songs("ORDER BY s.created_at DESC, s.rowid DESC"))
        .fetch_all(pool)
        .await?;

    collect(rows)
}

/// Songs uploaded by one artist, newest first
pub async fn list_by_artist(pool: &SqlitePool, artist_id: Uuid) -> Result<Vec<SongWithArtist>> {
    let rows = sqlx::query(&select_songs(
        "WHERE s.artist_id = ? ORDER BY s.created_at DESC, s.rowid DESC",
    ))
    .bind(artist_id.to_string())
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Album tracks in upload order
pub async fn list_by_album(pool: &SqlitePool, album_id: Uuid) -> Result<Vec<SongWithArtist>> {
    let rows = sqlx::query(&select_songs(
        "WHERE s.album_id = ? ORDER BY s.created_at ASC, s.rowid ASC",
    ))
    .bind(album_id.to_string())
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Playlist entries in playlist order
pub async fn list_by_playlist(
    pool: &SqlitePool,
    playlist_id: Uuid,
) -> Result<Vec<SongWithArtist>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM playlist_songs ps
        JOIN songs s ON s.id = ps.song_id
        JOIN users u ON u.id = s.artist_id
        WHERE ps.playlist_id = ?
        ORDER BY ps.sort_order ASC, ps.rowid ASC
        "#,
        SONG_COLUMNS
    ))
    .bind(playlist_id.to_string())
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Persist every mutable column and bump `updated_at`
pub async fn update(pool: &SqlitePool, song: &mut Song) -> Result<()> {
    song.updated_at = time::now();

    sqlx::query(
        r#"
        UPDATE songs
        SET title = ?, artist_name = ?, album_id = ?, audio_url = ?, cover_url = ?,
            duration = ?, genre = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&song.title)
    .bind(&song.artist_name)
    .bind(song.album_id.map(|id| id.to_string()))
    .bind(&song.audio_url)
    .bind(&song.cover_url)
    .bind(song.duration)
    .bind(&song.genre)
    .bind(time::to_db(&song.updated_at))
    .bind(song.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
