//! Integration tests for health, profiles and the global router layers

mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartBody, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "UP");
    assert_eq!(response.body["module"], "cobham-api");
    assert!(response.body["uptimeSeconds"].is_u64());
    assert!(response.body["cache"]["responses"]["hits"].is_u64());
}

#[tokio::test]
async fn test_health_reports_profile_cache() {
    let app = TestApp::new().await;
    let stats = |body: &serde_json::Value, name: &str| {
        body["cache"]["profiles"][name].as_u64().unwrap()
    };

    // Setup syncs both users, which loads their profiles
    let before = app.get("/health", None).await.body;
    assert_eq!(stats(&before, "keys"), 2);

    app.get("/api/auth/me", Some(app.user(0))).await;
    app.get("/api/auth/me", Some(app.user(0))).await;

    let after = app.get("/health", None).await.body;
    assert_eq!(stats(&after, "keys"), 2);
    assert_eq!(stats(&after, "hits"), stats(&before, "hits") + 2);
    assert_eq!(stats(&after, "misses"), stats(&before, "misses"));
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(response.headers["referrer-policy"], "no-referrer");
}

#[tokio::test]
async fn test_unknown_path_returns_envelope() {
    let app = TestApp::new().await;

    let response = app.get("/api/nowhere", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["status"], "fail");
    assert_eq!(response.body["message"], "Path not found: /api/nowhere");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/auth/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body["message"],
        "You are not authorized to access this resource."
    );

    let mut stranger = app.user(0).clone();
    stranger.token = "not-a-token".to_string();
    let response = app.get("/api/auth/me", Some(&stranger)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_profile_with_free_plan() {
    let app = TestApp::new().await;
    let user = app.user(0);

    let response = app.get("/api/auth/me", Some(user)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["id"], user.id.to_string());
    assert_eq!(response.body["data"]["email"], user.email);
    assert_eq!(response.body["data"]["fullName"], "Artist 1");
    assert!(response.body["data"]["subscription"].is_null());
}

#[tokio::test]
async fn test_sync_existing_profile_keeps_name() {
    let app = TestApp::new().await;
    let user = app.user(0);

    let response = app
        .json(
            Method::POST,
            "/api/auth/sync",
            Some(user),
            json!({ "id": user.id, "email": user.email, "fullName": "Someone Else" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Profile synced successfully.");
    assert_eq!(response.body["data"]["fullName"], "Artist 1");
}

#[tokio::test]
async fn test_sync_rejects_other_users_and_taken_emails() {
    let app = TestApp::new().await;
    let (first, second) = (app.user(0), app.user(1));

    let response = app
        .json(
            Method::POST,
            "/api/auth/sync",
            Some(first),
            json!({ "id": second.id, "email": second.email }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .json(
            Method::POST,
            "/api/auth/sync",
            Some(first),
            json!({ "id": first.id, "email": second.email }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["message"],
        "This email is already linked to another account."
    );
}

#[tokio::test]
async fn test_sync_requires_fields() {
    let app = TestApp::new().await;

    let response = app
        .json(Method::POST, "/api/auth/sync", Some(app.user(0)), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Missing required fields: id, email");
}

#[tokio::test]
async fn test_update_profile_with_avatar() {
    let app = TestApp::new().await;
    let user = app.user(0);

    let form = MultipartBody::new()
        .text("fullName", "New <Name>")
        .text("bio", "Writes songs")
        .file("avatar", "me.png", "image/png", b"\x89PNGfake");
    let response = app
        .multipart(Method::PUT, "/api/auth/update", Some(user), form)
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["message"], "Profile updated successfully.");
    assert_eq!(response.body["data"]["fullName"], "New &lt;Name&gt;");
    assert_eq!(response.body["data"]["bio"], "Writes songs");

    let avatar = response.body["data"]["avatarUrl"].as_str().unwrap();
    assert!(avatar.starts_with("http://localhost:5000/media/artwork/avatars/"));

    // Cached profile was invalidated
    let me = app.get("/api/auth/me", Some(user)).await;
    assert_eq!(me.body["data"]["bio"], "Writes songs");
}

#[tokio::test]
async fn test_update_profile_rejects_unexpected_file() {
    let app = TestApp::new().await;

    let form = MultipartBody::new().file("cover", "c.png", "image/png", b"png");
    let response = app
        .multipart(Method::PUT, "/api/auth/update", Some(app.user(0)), form)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Unexpected field.");
}

#[tokio::test]
async fn test_invalid_json_body_rejected() {
    let app = TestApp::new().await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/auth/sync")
        .header("authorization", format!("Bearer {}", app.user(0).token))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON body"));
}
