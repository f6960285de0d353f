//! Database queries
//!
//! Free async functions over a `SqlitePool` (or a transaction connection
//! where several writes must commit together). Identifiers are stored as
//! hyphenated TEXT, timestamps as fixed-width RFC 3339 TEXT.

pub mod albums;
pub mod favorites;
pub mod models;
pub mod payments;
pub mod player;
pub mod playlists;
pub mod songs;
pub mod subscriptions;
pub mod users;

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    uuid_utils::from_db(&value)
}

pub(crate) fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(uuid_utils::from_db).transpose()
}

pub(crate) fn get_time(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    time::from_db(&value)
}

pub(crate) fn get_opt_time(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(time::from_db).transpose()
}

pub(crate) fn get_json(row: &SqliteRow, column: &str) -> Result<Option<serde_json::Value>> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|s| {
            serde_json::from_str(&s).map_err(|e| {
                cobham_common::Error::Internal(format!("Corrupt JSON in {}: {}", column, e))
            })
        })
        .transpose()
}
