//! Payment persistence

use chrono::{DateTime, Utc};
use cobham_common::{time, uuid_utils, Result};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::models::PaymentStatus;
use super::{get_json, get_opt_time, get_opt_uuid, get_time, get_uuid};

#[derive(Debug, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Lower-case provider name
    pub provider: String,
    /// Provider order id
    pub provider_transaction_id: Option<String>,
    /// `<provider>:<captureId>` once a capture has been recorded
    pub idempotency_key: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(user_id: Uuid, amount_cents: i64, provider: &str) -> Self {
        let now = time::now();
        Self {
            id: uuid_utils::generate(),
            user_id,
            subscription_id: None,
            amount_cents,
            currency: "USD".to_string(),
            status: PaymentStatus::Created,
            provider: provider.to_lowercase(),
            provider_transaction_id: None,
            idempotency_key: None,
            processed_at: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set a key in the metadata object, creating it when absent
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        match self.metadata.as_mut() {
            Some(Value::Object(map)) => {
                map.insert(key.to_string(), value);
            }
            _ => {
                let mut map = serde_json::Map::new();
                map.insert(key.to_string(), value);
                self.metadata = Some(Value::Object(map));
            }
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: get_uuid(row, "id")?,
            user_id: get_uuid(row, "user_id")?,
            subscription_id: get_opt_uuid(row, "subscription_id")?,
            amount_cents: row.try_get("amount_cents")?,
            currency: row.try_get("currency")?,
            status: status.parse()?,
            provider: row.try_get("provider")?,
            provider_transaction_id: row.try_get("provider_transaction_id")?,
            idempotency_key: row.try_get("idempotency_key")?,
            processed_at: get_opt_time(row, "processed_at")?,
            metadata: get_json(row, "metadata")?,
            created_at: get_time(row, "created_at")?,
            updated_at: get_time(row, "updated_at")?,
        })
    }
}

pub async fn insert(pool: &SqlitePool, payment: &Payment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, user_id, subscription_id, amount_cents, currency, status, provider,
            provider_transaction_id, idempotency_key, processed_at, metadata,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payment.id.to_string())
    .bind(payment.user_id.to_string())
    .bind(payment.subscription_id.map(|id| id.to_string()))
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(&payment.provider)
    .bind(&payment.provider_transaction_id)
    .bind(&payment.idempotency_key)
    .bind(payment.processed_at.as_ref().map(time::to_db))
    .bind(payment.metadata.as_ref().map(Value::to_string))
    .bind(time::to_db(&payment.created_at))
    .bind(time::to_db(&payment.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist every mutable column and bump `updated_at`
pub async fn update<'e, E>(executor: E, payment: &mut Payment) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    payment.updated_at = time::now();

    sqlx::query(
        r#"
        UPDATE payments
        SET subscription_id = ?, status = ?, provider_transaction_id = ?, idempotency_key = ?,
            processed_at = ?, metadata = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(payment.subscription_id.map(|id| id.to_string()))
    .bind(payment.status.as_str())
    .bind(&payment.provider_transaction_id)
    .bind(&payment.idempotency_key)
    .bind(payment.processed_at.as_ref().map(time::to_db))
    .bind(payment.metadata.as_ref().map(Value::to_string))
    .bind(time::to_db(&payment.updated_at))
    .bind(payment.id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Payment>> {
    let row = sqlx::query("SELECT * FROM payments WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Payment::from_row).transpose()
}

/// Payment created for a provider order
pub async fn find_by_order(
    pool: &SqlitePool,
    provider: &str,
    order_id: &str,
) -> Result<Option<Payment>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM payments
        WHERE provider = ?
          AND (provider_transaction_id = ? OR json_extract(metadata, '$.orderId') = ?)
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(provider)
    .bind(order_id)
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(Payment::from_row).transpose()
}

/// Payment matching a provider transaction id or a recorded capture id
pub async fn find_by_transaction(
    pool: &SqlitePool,
    provider: &str,
    transaction_id: &str,
) -> Result<Option<Payment>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM payments
        WHERE provider = ?
          AND (provider_transaction_id = ? OR json_extract(metadata, '$.captureId') = ?)
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(provider)
    .bind(transaction_id)
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(Payment::from_row).transpose()
}

pub async fn find_by_idempotency_key(pool: &SqlitePool, key: &str) -> Result<Option<Payment>> {
    let row = sqlx::query("SELECT * FROM payments WHERE idempotency_key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Payment::from_row).transpose()
}

/// A user's payments, newest first
pub async fn list_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Payment>> {
    let rows = sqlx::query(
        "SELECT * FROM payments WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(Payment::from_row).collect()
}
