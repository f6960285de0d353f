//! Album persistence

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_time, get_uuid};

#[derive(Debug, Clone)]
pub struct Album {
    pub id: Uuid,
    pub title: String,
    pub artist_id: Uuid,
    pub description: Option<String>,
    /// Object path in the artwork bucket
    pub cover_url: Option<String>,
    pub release_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AlbumWithArtist {
    pub album: Album,
    pub artist_full_name: Option<String>,
    pub artist_avatar_url: Option<String>,
}

impl Album {
    pub fn new(title: String, artist_id: Uuid, description: Option<String>) -> Self {
        let now = time::now();
        Self {
            id: uuid_utils::generate(),
            title,
            artist_id,
            description,
            cover_url: None,
            release_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            artist_id: get_uuid(row, "artist_id")?,
            description: row.try_get("description")?,
            cover_url: row.try_get("cover_url")?,
            release_date: get_time(row, "release_date")?,
            created_at: get_time(row, "created_at")?,
            updated_at: get_time(row, "updated_at")?,
        })
    }
}

impl AlbumWithArtist {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            album: Album::from_row(row)?,
            artist_full_name: row.try_get("artist_full_name")?,
            artist_avatar_url: row.try_get("artist_avatar_url")?,
        })
    }
}

/// Column list for queries joining `albums a` with `users u`
pub(crate) const ALBUM_COLUMNS: &str = r#"
    a.id, a.title, a.artist_id, a.description, a.cover_url, a.release_date,
    a.created_at, a.updated_at,
    u.full_name AS artist_full_name, u.avatar_url AS artist_avatar_url
"#;

fn select_albums(clause: &str) -> String {
    format!(
        "SELECT {} FROM albums a JOIN users u ON u.id = a.artist_id {}",
        ALBUM_COLUMNS, clause
    )
}

fn collect(rows: Vec<SqliteRow>) -> Result<Vec<AlbumWithArtist>> {
    rows.iter().map(AlbumWithArtist::from_row).collect()
}

pub async fn insert(pool: &SqlitePool, album: &Album) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO albums (
            id, title, artist_id, description, cover_url, release_date, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(album.id.to_string())
    .bind(&album.title)
    .bind(album.artist_id.to_string())
    .bind(&album.description)
    .bind(&album.cover_url)
    .bind(time::to_db(&album.release_date))
    .bind(time::to_db(&album.created_at))
    .bind(time::to_db(&album.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Album>> {
    let row = sqlx::query("SELECT * FROM albums WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Album::from_row).transpose()
}

pub async fn exists(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM albums WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

pub async fn find_with_artist(pool: &SqlitePool, id: Uuid) -> Result<Option<AlbumWithArtist>> {
    let row = sqlx::query(&select_albums("WHERE a.id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(AlbumWithArtist::from_row).transpose()
}

/// All albums, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<AlbumWithArtist>> {
    let rows = sqlx::query(&select_albums("ORDER BY a.created_at DESC, a.rowid DESC"))
        .fetch_all(pool)
        .await?;

    collect(rows)
}

pub async fn list_by_artist(pool: &SqlitePool, artist_id: Uuid) -> Result<Vec<AlbumWithArtist>> {
    let rows = sqlx::query(&select_albums(
        "WHERE a.artist_id = ? ORDER BY a.created_at DESC, a.rowid DESC",
    ))
    .bind(artist_id.to_string())
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Persist every mutable column and bump `updated_at`
pub async fn update(pool: &SqlitePool, album: &mut Album) -> Result<()> {
    album.updated_at = time::now();

    sqlx::query(
        r#"
        UPDATE albums
        SET title = ?, description = ?, cover_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&album.title)
    .bind(&album.description)
    .bind(&album.cover_url)
    .bind(time::to_db(&album.updated_at))
    .bind(album.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete an album; its songs stay with `album_id` cleared
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM albums WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
