//! Subscription lifecycle

use cobham_common::{time, Result};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::models::Plan;
use crate::db::subscriptions::{self, Subscription};
use crate::error::{ApiResult, AppError};

pub async fn current(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Subscription>> {
    subscriptions::current_active(pool, user_id).await
}

/// Start a paid period, replacing any active subscription
pub async fn activate(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    plan: Plan,
    payment_id: Uuid,
) -> Result<Subscription> {
    let subscription = subscriptions::activate(
        conn,
        user_id,
        plan,
        Some(json!({ "paymentId": payment_id })),
    )
    .await?;

    info!(
        user_id = %user_id,
        plan = %plan,
        subscription_id = %subscription.id,
        "Activated subscription"
    );
    Ok(subscription)
}

/// Cancel the user's current subscription
pub async fn cancel_current(pool: &SqlitePool, user_id: Uuid) -> ApiResult<Subscription> {
    let current = current(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;

    let mut conn = pool.acquire().await?;
    subscriptions::cancel(&mut conn, current.id).await?;
    info!(user_id = %user_id, subscription_id = %current.id, "Cancelled subscription");

    subscriptions::find_by_id(pool, current.id)
        .await?
        .ok_or_else(AppError::not_found)
}

/// Expire active subscriptions past their end date
pub async fn cleanup_expired(pool: &SqlitePool) -> Result<u64> {
    let expired = subscriptions::expire_overdue(pool, time::now()).await?;
    if expired > 0 {
        info!(count = expired, "Expired overdue subscriptions");
    }
    Ok(expired)
}
