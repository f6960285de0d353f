//! Background maintenance tasks

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::{ResponseCache, TtlCache};
use crate::dto::UserDto;
use crate::services::subscriptions;

/// Periodically expire overdue subscriptions and drop stale cache entries
/// until `cancel` fires
///
/// Returns `None` when `interval` is zero (sweeping disabled).
pub fn spawn_subscription_sweeper(
    pool: SqlitePool,
    response_cache: ResponseCache,
    profiles: TtlCache<String, UserDto>,
    interval: Duration,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("Subscription sweeper disabled");
        return None;
    }

    info!(interval_secs = interval.as_secs(), "Starting subscription sweeper");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Subscription sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = subscriptions::cleanup_expired(&pool).await {
                        error!(error = %e, "Subscription sweep failed");
                    }

                    let purged = response_cache.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "Purged expired cached responses");
                    }

                    let purged = profiles.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "Purged expired profiles");
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cobham_common::db::create_schema;
    use uuid::Uuid;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_zero_interval_disables_sweeper() {
        let pool = memory_pool().await;
        let handle = spawn_subscription_sweeper(
            pool,
            ResponseCache::new(),
            TtlCache::default(),
            Duration::ZERO,
            CancellationToken::new(),
        );
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let pool = memory_pool().await;
        let cancel = CancellationToken::new();
        let handle = spawn_subscription_sweeper(
            pool,
            ResponseCache::new(),
            TtlCache::default(),
            Duration::from_millis(10),
            cancel.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired_profiles() {
        let pool = memory_pool().await;
        let profiles: TtlCache<String, UserDto> = TtlCache::default();
        let profile = UserDto {
            id: Uuid::new_v4(),
            email: "stale@example.com".to_string(),
            full_name: None,
            avatar_url: None,
            bio: None,
            subscription: None,
            created_at: Utc::now(),
        };
        profiles
            .set_with_ttl("profile:stale".to_string(), profile.clone(), Duration::from_millis(5))
            .await;
        profiles.set("profile:fresh".to_string(), profile).await;

        let cancel = CancellationToken::new();
        let handle = spawn_subscription_sweeper(
            pool,
            ResponseCache::new(),
            profiles.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(profiles.stats().await.keys, 1);
        assert!(profiles.get(&"profile:fresh".to_string()).await.is_some());
    }
}
