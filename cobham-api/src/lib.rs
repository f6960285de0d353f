//! cobham-api library interface
//!
//! Exposes the router and application state so integration tests can drive
//! the service without binding a socket.

pub mod api;
pub mod cache;
pub mod db;
pub mod dto;
pub mod error;
pub mod extract;
pub mod identity;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod storage;
pub mod tasks;
pub mod upload;
pub mod validation;

pub use crate::error::{ApiResult, AppError};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Uri},
    Router,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::cache::{ResponseCache, TtlCache, DEFAULT_TTL};
use crate::dto::UserDto;
use crate::identity::IdentityProvider;
use crate::payments::PaymentRegistry;
use crate::storage::MediaStorage;
use crate::upload::MAX_BODY_SIZE;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Verifies bearer tokens
    pub identity: Arc<dyn IdentityProvider>,
    /// Media uploads and URL signing
    pub storage: MediaStorage,
    /// Payment providers by name
    pub payments: PaymentRegistry,
    /// Cached GET responses for catalog routes
    pub response_cache: ResponseCache,
    /// Profiles keyed by `profile:<id>`
    pub profiles: TtlCache<String, UserDto>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Local media folder served under `/media` (local storage only)
    pub media_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        identity: Arc<dyn IdentityProvider>,
        storage: MediaStorage,
        payments: PaymentRegistry,
    ) -> Self {
        Self {
            db,
            identity,
            storage,
            payments,
            response_cache: ResponseCache::new(),
            profiles: TtlCache::new(DEFAULT_TTL),
            startup_time: Utc::now(),
            media_dir: None,
        }
    }

    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = Some(dir.into());
        self
    }
}

async fn path_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Path not found: {}", uri.path()))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes(&state))
        .merge(api::song_routes(&state))
        .merge(api::album_routes(&state))
        .merge(api::playlist_routes(&state))
        .merge(api::favorite_routes(&state))
        .merge(api::player_routes(&state))
        .merge(api::payment_routes(&state));

    if let Some(dir) = &state.media_dir {
        router = router.nest_service("/media", ServeDir::new(dir));
    }

    router
        .fallback(path_not_found)
        .layer(axum::middleware::from_fn(middleware::sanitize_json_body))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
