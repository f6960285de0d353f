//! Subscription persistence

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Result};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::models::{Plan, SubscriptionStatus};
use super::{get_json, get_opt_time, get_time, get_uuid};

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let plan: String = row.try_get("plan")?;
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: get_uuid(row, "id")?,
            user_id: get_uuid(row, "user_id")?,
            plan: plan.parse()?,
            status: status.parse()?,
            start_date: get_time(row, "start_date")?,
            end_date: get_opt_time(row, "end_date")?,
            auto_renew: row.try_get("auto_renew")?,
            metadata: get_json(row, "metadata")?,
            created_at: get_time(row, "created_at")?,
            updated_at: get_time(row, "updated_at")?,
        })
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Subscription>> {
    let row = sqlx::query("SELECT * FROM subscriptions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Subscription::from_row).transpose()
}

/// Active subscription with the latest end date
pub async fn current_active(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Subscription>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = ? AND status = 'active'
        ORDER BY end_date DESC, created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(Subscription::from_row).transpose()
}

/// Cancel the user's active subscriptions and start a new one
///
/// Runs on the caller's connection so it can share a transaction with the
/// payment update that triggered it.
pub async fn activate(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    plan: Plan,
    metadata: Option<Value>,
) -> Result<Subscription> {
    let now = time::now();

    sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'cancelled', updated_at = ?
        WHERE user_id = ? AND status = 'active'
        "#,
    )
    .bind(time::to_db(&now))
    .bind(user_id.to_string())
    .execute(&mut *conn)
    .await?;

    let subscription = Subscription {
        id: uuid_utils::generate(),
        user_id,
        plan,
        status: SubscriptionStatus::Active,
        start_date: now,
        end_date: Some(time::add_months(now, plan.months())),
        auto_renew: true,
        metadata,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, user_id, plan, status, start_date, end_date, auto_renew, metadata,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subscription.id.to_string())
    .bind(user_id.to_string())
    .bind(plan.as_str())
    .bind(subscription.status.as_str())
    .bind(time::to_db(&subscription.start_date))
    .bind(subscription.end_date.as_ref().map(time::to_db))
    .bind(subscription.auto_renew)
    .bind(subscription.metadata.as_ref().map(Value::to_string))
    .bind(time::to_db(&subscription.created_at))
    .bind(time::to_db(&subscription.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(subscription)
}

/// Cancel a subscription and stop auto renewal
///
/// Returns false when the subscription was not active.
pub async fn cancel(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'cancelled', auto_renew = 0, updated_at = ?
        WHERE id = ? AND status = 'active'
        "#,
    )
    .bind(time::to_db(&time::now()))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark active subscriptions whose end date has passed as expired
pub async fn expire_overdue(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let now = time::to_db(&now);
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'expired', updated_at = ?
        WHERE status = 'active' AND end_date IS NOT NULL AND end_date < ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
