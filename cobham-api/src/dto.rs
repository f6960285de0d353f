//! JSON response bodies
//!
//! Rows carry object paths; the DTOs carry signed URLs. Signing happens here
//! so every route returning a song, album or profile signs the same fields.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::db::albums::AlbumWithArtist;
use crate::db::models::{format_cents, PaymentStatus, Plan, SubscriptionStatus};
use crate::db::payments::Payment;
use crate::db::player::{HistoryEntry, QueueEntry};
use crate::db::playlists::Playlist;
use crate::db::songs::SongWithArtist;
use crate::db::subscriptions::Subscription;
use crate::db::users::User;
use crate::storage::{Bucket, MediaStorage};

const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Artist summary embedded in songs and albums
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDto {
    pub id: Uuid,
    pub title: String,
    pub artist_id: Uuid,
    pub artist_name: Option<String>,
    pub album_id: Option<Uuid>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub duration: i64,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub artist: ArtistSummary,
}

impl SongDto {
    pub async fn build(storage: &MediaStorage, row: SongWithArtist) -> Self {
        let song = row.song;
        let (audio_url, cover_url, avatar_url) = tokio::join!(
            storage.sign(Bucket::Audio, Some(&song.audio_url)),
            storage.sign(Bucket::Artwork, song.cover_url.as_deref()),
            storage.sign(Bucket::Artwork, row.artist_avatar_url.as_deref()),
        );

        let name = song
            .artist_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or(row.artist_full_name)
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        Self {
            id: song.id,
            title: song.title,
            artist_id: song.artist_id,
            artist_name: song.artist_name,
            album_id: song.album_id,
            audio_url,
            cover_url,
            duration: song.duration,
            genre: song.genre,
            created_at: song.created_at,
            artist: ArtistSummary {
                id: song.artist_id,
                name,
                avatar_url,
            },
        }
    }

    pub async fn build_all(storage: &MediaStorage, rows: Vec<SongWithArtist>) -> Vec<Self> {
        join_all(rows.into_iter().map(|row| Self::build(storage, row))).await
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDto {
    pub id: Uuid,
    pub title: String,
    pub artist_id: Uuid,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub artist: ArtistSummary,
    pub songs: Vec<SongDto>,
}

impl AlbumDto {
    pub async fn build(
        storage: &MediaStorage,
        row: AlbumWithArtist,
        songs: Vec<SongWithArtist>,
    ) -> Self {
        let album = row.album;
        let (cover_url, avatar_url, songs) = tokio::join!(
            storage.sign(Bucket::Artwork, album.cover_url.as_deref()),
            storage.sign(Bucket::Artwork, row.artist_avatar_url.as_deref()),
            SongDto::build_all(storage, songs),
        );

        Self {
            id: album.id,
            title: album.title,
            artist_id: album.artist_id,
            description: album.description,
            cover_url,
            release_date: album.release_date,
            created_at: album.created_at,
            artist: ArtistSummary {
                id: album.artist_id,
                name: row
                    .artist_full_name
                    .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
                avatar_url,
            },
            songs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub user_id: Uuid,
    pub is_private: bool,
    pub cover_url: Option<String>,
    pub songs: Vec<SongDto>,
    pub created_at: DateTime<Utc>,
}

impl PlaylistDto {
    pub async fn build(
        storage: &MediaStorage,
        playlist: Playlist,
        songs: Vec<SongWithArtist>,
    ) -> Self {
        let (cover_url, songs) = tokio::join!(
            storage.sign(Bucket::Artwork, playlist.cover_url.as_deref()),
            SongDto::build_all(storage, songs),
        );

        Self {
            id: playlist.id,
            title: playlist.title,
            description: playlist.description,
            user_id: playlist.user_id,
            is_private: playlist.is_private,
            cover_url,
            songs,
            created_at: playlist.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionDto {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            plan: s.plan,
            status: s.status,
            start_date: s.start_date,
            end_date: s.end_date,
            auto_renew: s.auto_renew,
            created_at: s.created_at,
        }
    }
}

/// Subscription shown to the user; users without one are on the free plan
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CurrentSubscription {
    Active(SubscriptionDto),
    Free {
        plan: Plan,
        status: SubscriptionStatus,
    },
}

impl From<Option<Subscription>> for CurrentSubscription {
    fn from(subscription: Option<Subscription>) -> Self {
        match subscription {
            Some(s) => CurrentSubscription::Active(s.into()),
            None => CurrentSubscription::Free {
                plan: Plan::Free,
                status: SubscriptionStatus::Active,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub subscription: Option<SubscriptionDto>,
    pub created_at: DateTime<Utc>,
}

impl UserDto {
    pub async fn build(
        storage: &MediaStorage,
        user: User,
        subscription: Option<Subscription>,
    ) -> Self {
        let avatar_url = storage
            .sign(Bucket::Artwork, user.avatar_url.as_deref())
            .await;

        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            avatar_url,
            bio: user.bio,
            subscription: subscription.map(Into::into),
            created_at: user.created_at,
        }
    }
}

/// Public artist profile
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDto {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
}

impl ArtistDto {
    pub async fn build(storage: &MediaStorage, user: User) -> Self {
        let avatar_url = storage
            .sign(Bucket::Artwork, user.avatar_url.as_deref())
            .await;

        Self {
            id: user.id,
            name: user
                .full_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            avatar_url,
            bio: user.bio.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDto {
    pub played_at: DateTime<Utc>,
    pub song: SongDto,
}

impl HistoryDto {
    pub async fn build_all(storage: &MediaStorage, entries: Vec<HistoryEntry>) -> Vec<Self> {
        join_all(entries.into_iter().map(|entry| async move {
            Self {
                played_at: entry.played_at,
                song: SongDto::build(storage, entry.song).await,
            }
        }))
        .await
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryDto {
    pub position: i64,
    pub song: SongDto,
}

impl QueueEntryDto {
    pub async fn build_all(storage: &MediaStorage, entries: Vec<QueueEntry>) -> Vec<Self> {
        join_all(entries.into_iter().map(|entry| async move {
            Self {
                position: entry.position,
                song: SongDto::build(storage, entry.song).await,
            }
        }))
        .await
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggle {
    pub is_favorite: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    /// Decimal amount, e.g. "9.99"
    pub amount: String,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider: String,
    pub provider_transaction_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentDto {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            subscription_id: p.subscription_id,
            amount: format_cents(p.amount_cents),
            currency: p.currency,
            status: p.status,
            provider: p.provider,
            provider_transaction_id: p.provider_transaction_id,
            processed_at: p.processed_at,
            metadata: p.metadata,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub payment_id: Uuid,
    pub order_id: String,
    pub links: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_subscription_fallback() {
        let value = serde_json::to_value(CurrentSubscription::from(None)).unwrap();
        assert_eq!(value, json!({ "plan": "free", "status": "active" }));
    }

    #[test]
    fn test_payment_amount_rendered_as_decimal() {
        let mut payment = Payment::new(Uuid::new_v4(), Plan::Yearly.price_cents(), "PayPal");
        payment.provider_transaction_id = Some("ORDER-1".into());

        let value = serde_json::to_value(PaymentDto::from(payment)).unwrap();
        assert_eq!(value["amount"], "89.99");
        assert_eq!(value["provider"], "paypal");
        assert_eq!(value["status"], "created");
        assert_eq!(value["providerTransactionId"], "ORDER-1");
    }
}
