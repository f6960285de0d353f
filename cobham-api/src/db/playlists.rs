//! Playlist persistence

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_time, get_uuid};

#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: Uuid,
    pub title: String,
    pub user_id: Uuid,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn new(title: String, user_id: Uuid) -> Self {
        let now = time::now();
        Self {
            id: uuid_utils::generate(),
            title,
            user_id,
            description: None,
            cover_url: None,
            is_private: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            user_id: get_uuid(row, "user_id")?,
            description: row.try_get("description")?,
            cover_url: row.try_get("cover_url")?,
            is_private: row.try_get("is_private")?,
            created_at: get_time(row, "created_at")?,
            updated_at: get_time(row, "updated_at")?,
        })
    }
}

pub async fn insert(pool: &SqlitePool, playlist: &Playlist) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO playlists (
            id, title, user_id, description, cover_url, is_private, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(playlist.id.to_string())
    .bind(&playlist.title)
    .bind(playlist.user_id.to_string())
    .bind(&playlist.description)
    .bind(&playlist.cover_url)
    .bind(playlist.is_private)
    .bind(time::to_db(&playlist.created_at))
    .bind(time::to_db(&playlist.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Playlist>> {
    let row = sqlx::query("SELECT * FROM playlists WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Playlist::from_row).transpose()
}

/// A user's playlists, newest first
pub async fn list_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Playlist>> {
    let rows = sqlx::query(
        "SELECT * FROM playlists WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(Playlist::from_row).collect()
}

/// Persist every mutable column and bump `updated_at`
pub async fn update(pool: &SqlitePool, playlist: &mut Playlist) -> Result<()> {
    playlist.updated_at = time::now();

    sqlx::query(
        r#"
        UPDATE playlists
        SET title = ?, description = ?, cover_url = ?, is_private = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&playlist.title)
    .bind(&playlist.description)
    .bind(&playlist.cover_url)
    .bind(playlist.is_private)
    .bind(time::to_db(&playlist.updated_at))
    .bind(playlist.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Append a song after the current last entry
///
/// Returns false when the song is already in the playlist.
pub async fn add_song(pool: &SqlitePool, playlist_id: Uuid, song_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO playlist_songs (playlist_id, song_id, sort_order, created_at)
        SELECT ?, ?, COALESCE(MAX(sort_order), 0) + 1, ?
        FROM playlist_songs
        WHERE playlist_id = ?
        "#,
    )
    .bind(playlist_id.to_string())
    .bind(song_id.to_string())
    .bind(time::to_db(&time::now()))
    .bind(playlist_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_song(pool: &SqlitePool, playlist_id: Uuid, song_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = ? AND song_id = ?")
        .bind(playlist_id.to_string())
        .bind(song_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
