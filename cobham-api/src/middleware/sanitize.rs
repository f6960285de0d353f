//! JSON request sanitizing
//!
//! Every string in a JSON body is trimmed and HTML-escaped before handlers
//! see it. Multipart text fields are cleaned by the form extractor instead.
//! Provider webhooks pass through untouched so their signatures still
//! verify.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    middleware::Next,
    response::Response,
};
use cobham_common::sanitize::sanitize_json;
use tracing::debug;

use crate::error::AppError;
use crate::upload::MAX_BODY_SIZE;

const WEBHOOK_PREFIX: &str = "/api/payments/webhook/";

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

pub async fn sanitize_json_body(request: Request, next: Next) -> Result<Response, AppError> {
    if !is_json(&request) || request.uri().path().starts_with(WEBHOOK_PREFIX) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {}", e)))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await);
    }

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    let cleaned = serde_json::to_vec(&sanitize_json(value))
        .map_err(|e| AppError::Internal(format!("Failed to encode sanitized body: {}", e)))?;

    debug!(path = %parts.uri.path(), "Sanitized JSON body");
    parts.headers.insert(CONTENT_LENGTH, cleaned.len().into());

    Ok(next.run(Request::from_parts(parts, Body::from(cleaned))).await)
}
