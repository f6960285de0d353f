//! Favorite songs and albums

use cobham_common::{time, Result};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::albums::{AlbumWithArtist, ALBUM_COLUMNS};
use super::songs::{SongWithArtist, SONG_COLUMNS};

/// Which favorites table a toggle targets
#[derive(Debug, Clone, Copy)]
enum Target {
    Song,
    Album,
}

impl Target {
    fn table(&self) -> &'static str {
        match self {
            Target::Song => "favorites",
            Target::Album => "favorite_albums",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Target::Song => "song_id",
            Target::Album => "album_id",
        }
    }
}

async fn toggle(conn: &mut SqliteConnection, target: Target, user_id: Uuid, id: Uuid) -> Result<bool> {
    let removed = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = ? AND {} = ?",
        target.table(),
        target.column()
    ))
    .bind(user_id.to_string())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    if removed.rows_affected() > 0 {
        return Ok(false);
    }

    let now = time::to_db(&time::now());
    sqlx::query(&format!(
        "INSERT INTO {} (user_id, {}, created_at, updated_at) VALUES (?, ?, ?, ?)",
        target.table(),
        target.column()
    ))
    .bind(user_id.to_string())
    .bind(id.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(true)
}

/// Flip a song favorite, returning whether it is now a favorite
pub async fn toggle_song(pool: &SqlitePool, user_id: Uuid, song_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let is_favorite = toggle(&mut tx, Target::Song, user_id, song_id).await?;
    tx.commit().await?;
    Ok(is_favorite)
}

/// Flip an album favorite, returning whether it is now a favorite
pub async fn toggle_album(pool: &SqlitePool, user_id: Uuid, album_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let is_favorite = toggle(&mut tx, Target::Album, user_id, album_id).await?;
    tx.commit().await?;
    Ok(is_favorite)
}

/// Favorite songs, most recently favorited first
pub async fn list_songs(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<SongWithArtist>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM favorites f
        JOIN songs s ON s.id = f.song_id
        JOIN users u ON u.id = s.artist_id
        WHERE f.user_id = ?
        ORDER BY f.created_at DESC, f.rowid DESC
        "#,
        SONG_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(SongWithArtist::from_row).collect()
}

/// Favorite albums, most recently favorited first
pub async fn list_albums(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<AlbumWithArtist>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM favorite_albums f
        JOIN albums a ON a.id = f.album_id
        JOIN users u ON u.id = a.artist_id
        WHERE f.user_id = ?
        ORDER BY f.created_at DESC, f.rowid DESC
        "#,
        ALBUM_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(AlbumWithArtist::from_row).collect()
}
