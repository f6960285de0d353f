//! User profile persistence
//!
//! The user id is the identity provider's user id, so rows are created by
//! the profile sync endpoint rather than a registration flow.

use chrono::{DateTime, Utc};
use cobham_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_time, get_uuid};

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: Uuid, email: String) -> Self {
        let now = time::now();
        Self {
            id,
            email,
            full_name: None,
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            avatar_url: row.try_get("avatar_url")?,
            bio: row.try_get("bio")?,
            created_at: get_time(row, "created_at")?,
            updated_at: get_time(row, "updated_at")?,
        })
    }
}

const SELECT_USER: &str =
    "SELECT id, email, full_name, avatar_url, bio, created_at, updated_at FROM users";

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE email = ?", SELECT_USER))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn insert(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, full_name, avatar_url, bio, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.avatar_url)
    .bind(&user.bio)
    .bind(time::to_db(&user.created_at))
    .bind(time::to_db(&user.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist every mutable column and bump `updated_at`
pub async fn update(pool: &SqlitePool, user: &mut User) -> Result<()> {
    user.updated_at = time::now();

    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, full_name = ?, avatar_url = ?, bio = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.avatar_url)
    .bind(&user.bio)
    .bind(time::to_db(&user.updated_at))
    .bind(user.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
