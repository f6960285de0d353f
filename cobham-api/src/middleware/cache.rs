//! GET response caching
//!
//! Applied per method router so it runs after authentication; keys for
//! authenticated callers carry the user id so private listings never leak
//! between users.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::warn;

use crate::cache::{CachedResponse, ResponseCache};
use crate::identity::AuthUser;

/// Cache handle plus the TTL for one route
pub type CacheRoute = (ResponseCache, Duration);

pub fn cache_for(cache: &ResponseCache, seconds: u64) -> CacheRoute {
    (cache.clone(), Duration::from_secs(seconds))
}

fn cache_key(request: &Request) -> String {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.id.to_string());
    format!("{}|{}", user.as_deref().unwrap_or("-"), request.uri())
}

fn with_cache_header(mut response: Response, value: &'static str) -> Response {
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static(value));
    response
}

pub async fn cache_response(
    State((cache, ttl)): State<CacheRoute>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(&request);
    if let Some(hit) = cache.get(&key).await {
        let mut response = (hit.status, hit.body).into_response();
        if let Some(content_type) = hit.content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        return with_cache_header(response, "HIT");
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, "Failed to buffer response for caching: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    cache
        .put(
            key,
            CachedResponse {
                status: parts.status,
                content_type: parts.headers.get(CONTENT_TYPE).cloned(),
                body: bytes.clone(),
            },
            ttl,
        )
        .await;

    with_cache_header(Response::from_parts(parts, Body::from(bytes)), "MISS")
}
