//! Listening history and the persisted play queue

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::get_time;
use super::songs::{SongWithArtist, SONG_COLUMNS};

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub played_at: DateTime<Utc>,
    pub song: SongWithArtist,
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub position: i64,
    pub song: SongWithArtist,
}

/// Requested queue slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueItem {
    pub song_id: Uuid,
    pub position: i64,
}

pub async fn add_history(pool: &SqlitePool, user_id: Uuid, song_id: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO player_histories (id, user_id, song_id, played_at) VALUES (?, ?, ?, ?)",
    )
    .bind(uuid_utils::generate().to_string())
    .bind(user_id.to_string())
    .bind(song_id.to_string())
    .bind(time::to_db(&time::now()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent plays first
pub async fn list_history(
    pool: &SqlitePool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT h.played_at, {}
        FROM player_histories h
        JOIN songs s ON s.id = h.song_id
        JOIN users u ON u.id = s.artist_id
        WHERE h.user_id = ?
        ORDER BY h.played_at DESC, h.rowid DESC
        LIMIT ?
        "#,
        SONG_COLUMNS
    ))
    .bind(user_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(HistoryEntry {
                played_at: get_time(row, "played_at")?,
                song: SongWithArtist::from_row(row)?,
            })
        })
        .collect()
}

/// Replace the user's whole queue in one transaction
///
/// Fails with `NotFound` (and leaves the old queue intact) when any song
/// does not exist.
pub async fn replace_queue(pool: &SqlitePool, user_id: Uuid, items: &[QueueItem]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM player_queues WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

    let now = time::to_db(&time::now());
    for item in items {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM songs WHERE id = ?")
            .bind(item.song_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(Error::NotFound(format!("Song not found: {}", item.song_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO player_queues (id, user_id, song_id, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_utils::generate().to_string())
        .bind(user_id.to_string())
        .bind(item.song_id.to_string())
        .bind(item.position)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Queue in ascending position
pub async fn list_queue(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<QueueEntry>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT q.position, {}
        FROM player_queues q
        JOIN songs s ON s.id = q.song_id
        JOIN users u ON u.id = s.artist_id
        WHERE q.user_id = ?
        ORDER BY q.position ASC, q.rowid ASC
        "#,
        SONG_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(QueueEntry {
                position: sqlx::Row::try_get(row, "position")?,
                song: SongWithArtist::from_row(row)?,
            })
        })
        .collect()
}
