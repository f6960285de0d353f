//! Request middleware
//!
//! - [`require_auth`]: bearer token verification for protected routes
//! - [`cache_response`]: per-route GET response caching
//! - [`sanitize_json_body`]: HTML-escaping of JSON request strings

mod auth;
mod cache;
mod sanitize;

pub use auth::require_auth;
pub use cache::{cache_for, cache_response, CacheRoute};
pub use sanitize::sanitize_json_body;
