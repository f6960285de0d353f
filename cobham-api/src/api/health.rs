//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "UP" while the process serves requests
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub cache: CacheReport,
}

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub responses: CacheStats,
    pub profiles: CacheStats,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let uptime = now.signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "UP".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        timestamp: now,
        cache: CacheReport {
            responses: state.response_cache.stats().await,
            profiles: state.profiles.stats().await,
        },
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
