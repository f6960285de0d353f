//! Shared helpers for cobham-api integration tests
//!
//! Each test app gets its own temporary database and media folder, static
//! bearer tokens and an in-process payment provider.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use cobham_api::db::models::PaymentStatus;
use cobham_api::identity::StaticIdentity;
use cobham_api::payments::{
    parse_paypal_webhook, CaptureResult, OrderRequest, PaymentError, PaymentProvider,
    PaymentRegistry, ProviderOrder, RefundResult, WebhookEvent,
};
use cobham_api::storage::{LocalStore, MediaStorage};
use cobham_api::{build_router, AppState};

pub const BOUNDARY: &str = "cobham-test-boundary";

/// A signed-in test user
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub token: String,
}

/// Payment provider that approves everything and counts captures
///
/// Webhooks use PayPal's payload shape and skip signature checks.
#[derive(Default)]
pub struct FakeProvider {
    orders: AtomicUsize,
    pub captures: AtomicUsize,
    pub refunds: AtomicUsize,
}

impl FakeProvider {
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn refunds(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    fn name(&self) -> &str {
        "paypal"
    }

    async fn create_order(&self, _request: &OrderRequest) -> Result<ProviderOrder, PaymentError> {
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("ORDER-{}", n);
        Ok(ProviderOrder {
            links: json!([{ "rel": "approve", "href": format!("https://pay.test/{}", order_id) }]),
            order_id,
            status: "CREATED".to_string(),
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PaymentError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let capture_id = format!("CAPTURE-{}", order_id);
        Ok(CaptureResult {
            raw: json!({ "id": order_id, "status": "COMPLETED" }),
            capture_id: Some(capture_id),
            status: "COMPLETED".to_string(),
        })
    }

    async fn refund(&self, capture_id: &str) -> Result<RefundResult, PaymentError> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(RefundResult {
            refund_id: format!("REFUND-{}", capture_id),
            status: "COMPLETED".to_string(),
        })
    }

    async fn verify_webhook(
        &self,
        _headers: &HeaderMap,
        payload: &Value,
    ) -> Result<WebhookEvent, PaymentError> {
        parse_paypal_webhook(payload)
    }

    fn normalize_status(&self, status: &str) -> PaymentStatus {
        match status {
            "COMPLETED" => PaymentStatus::Paid,
            "FAILED" => PaymentStatus::Failed,
            "REFUNDED" => PaymentStatus::Refunded,
            _ => PaymentStatus::Created,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub users: Vec<TestUser>,
    _dir: TempDir,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    /// App with two registered users (`users[0]`, `users[1]`)
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let pool = cobham_common::db::init_database(&dir.path().join("cobham.db"))
            .await
            .expect("Failed to initialize database");

        let users: Vec<TestUser> = (1..=2)
            .map(|n| TestUser {
                id: Uuid::new_v4(),
                name: format!("Artist {}", n),
                email: format!("listener{}@example.com", n),
                token: format!("token-{}", n),
            })
            .collect();

        let identity = users.iter().fold(StaticIdentity::new(), |identity, u| {
            identity.with_token(&u.token, u.id, Some(u.email.clone()))
        });

        let media_dir = dir.path().join("media");
        let store = LocalStore::new(media_dir.clone(), "http://localhost:5000");
        let storage = MediaStorage::new(
            Arc::new(store),
            "audio",
            "artwork",
            Duration::from_secs(3600),
        );

        let provider = Arc::new(FakeProvider::default());
        let payments = PaymentRegistry::new().with_provider(provider.clone());

        let state = AppState::new(pool, Arc::new(identity), storage, payments)
            .with_media_dir(media_dir);
        let router = build_router(state.clone());

        let app = Self {
            router,
            state,
            provider,
            users,
            _dir: dir,
        };

        for user in app.users.clone() {
            let response = app
                .json(
                    Method::POST,
                    "/api/auth/sync",
                    Some(&user),
                    json!({ "id": user.id, "email": user.email, "fullName": user.name }),
                )
                .await;
            assert_eq!(response.status, StatusCode::CREATED, "sync failed: {}", response.body);
        }

        app
    }

    pub fn user(&self, index: usize) -> &TestUser {
        &self.users[index]
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response: Response<Body> = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        let request = authorize(Request::builder().method(Method::GET).uri(uri), user)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        let request = authorize(Request::builder().method(Method::DELETE).uri(uri), user)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Value,
    ) -> TestResponse {
        let request = authorize(Request::builder().method(method).uri(uri), user)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        form: MultipartBody,
    ) -> TestResponse {
        let request = authorize(Request::builder().method(method).uri(uri), user)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }

    /// Upload a song as `user`, returning its JSON
    pub async fn upload_song(&self, user: &TestUser, title: &str) -> Value {
        let form = MultipartBody::new()
            .text("title", title)
            .text("duration", "180")
            .text("genre", "Indie")
            .file("audio", "track.mp3", "audio/mpeg", b"ID3fake-audio");
        let response = self
            .multipart(Method::POST, "/api/songs/upload", Some(user), form)
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "upload failed: {}", response.body);
        response.body["data"].clone()
    }
}

fn authorize(
    builder: axum::http::request::Builder,
    user: Option<&TestUser>,
) -> axum::http::request::Builder {
    match user {
        Some(user) => builder.header(header::AUTHORIZATION, format!("Bearer {}", user.token)),
        None => builder,
    }
}

/// Minimal multipart/form-data encoder
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.bytes
    }
}
