//! HTTP API handlers
//!
//! Each submodule exposes a `*_routes` builder; [`crate::build_router`]
//! merges them. Protected routes go through [`require_auth`]; cached GET
//! routes get a per-route [`cache_response`] layer inside authentication.

pub mod albums;
pub mod auth;
pub mod favorites;
pub mod health;
pub mod payments;
pub mod player;
pub mod playlists;
pub mod songs;

pub use albums::album_routes;
pub use auth::auth_routes;
pub use favorites::favorite_routes;
pub use health::health_routes;
pub use payments::payment_routes;
pub use player::player_routes;
pub use playlists::playlist_routes;
pub use songs::song_routes;

use axum::{middleware, routing::MethodRouter, Router};

use crate::middleware::{cache_for, cache_response, require_auth};
use crate::AppState;

/// Require a verified bearer token on every route of `router`
fn authenticated(state: &AppState, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

/// Cache successful GET responses of one route for `seconds`
fn cached(
    state: &AppState,
    seconds: u64,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.layer(middleware::from_fn_with_state(
        cache_for(&state.response_cache, seconds),
        cache_response,
    ))
}
