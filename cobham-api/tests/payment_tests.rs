//! Integration tests for checkout, webhooks, refunds and subscriptions

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, TestUser};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_order(app: &TestApp, user: &TestUser, plan: &str) -> Value {
    let response = app
        .json(
            Method::POST,
            "/api/payments/create-order",
            Some(user),
            json!({ "plan": plan }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.body["data"].clone()
}

async fn capture(app: &TestApp, user: &TestUser, order_id: &str) -> (StatusCode, Value) {
    let response = app
        .json(
            Method::POST,
            "/api/payments/capture",
            Some(user),
            json!({ "orderId": order_id }),
        )
        .await;
    (response.status, response.body)
}

async fn webhook(app: &TestApp, provider: &str, payload: Value) -> Value {
    let response = app
        .json(
            Method::POST,
            &format!("/api/payments/webhook/{}", provider),
            None,
            payload,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    response.body
}

#[tokio::test]
async fn test_create_order_records_payment() {
    let app = TestApp::new().await;
    let user = app.user(0);

    let order = create_order(&app, user, "student").await;
    assert_eq!(order["orderId"], "ORDER-1");
    assert!(order["links"].is_array());

    let history = app.get("/api/payments/history", Some(user)).await;
    assert_eq!(history.status, StatusCode::OK);
    let payment = &history.body["data"][0];
    assert_eq!(payment["id"], order["paymentId"]);
    assert_eq!(payment["amount"], "4.99");
    assert_eq!(payment["currency"], "USD");
    assert_eq!(payment["status"], "created");
    assert_eq!(payment["providerTransactionId"], "ORDER-1");
}

#[tokio::test]
async fn test_unknown_provider_rejected() {
    let app = TestApp::new().await;

    let response = app
        .json(
            Method::POST,
            "/api/payments/create-order",
            Some(app.user(0)),
            json!({ "plan": "monthly", "provider": "stripe" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Payment provider 'stripe' not supported");
}

#[tokio::test]
async fn test_capture_activates_subscription_once() {
    let app = TestApp::new().await;
    let user = app.user(0);
    let order = create_order(&app, user, "yearly").await;
    let order_id = order["orderId"].as_str().unwrap();

    let (status, body) = capture(&app, user, order_id).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "paid");
    assert_eq!(body["data"]["amount"], "89.99");
    assert_eq!(body["data"]["metadata"]["captureId"], "CAPTURE-ORDER-1");
    let subscription_id = body["data"]["subscriptionId"].clone();
    assert!(subscription_id.is_string());

    // Second capture returns the stored payment without calling the provider
    let (status, body) = capture(&app, user, order_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscriptionId"], subscription_id);
    assert_eq!(app.provider.captures(), 1);

    let current = app.get("/api/payments/subscription", Some(user)).await;
    assert_eq!(current.body["data"]["id"], subscription_id);
    assert_eq!(current.body["data"]["plan"], "yearly");
    assert_eq!(current.body["data"]["status"], "active");

    let me = app.get("/api/auth/me", Some(user)).await;
    assert_eq!(me.body["data"]["subscription"]["plan"], "yearly");
}

#[tokio::test]
async fn test_capture_validation_and_ownership() {
    let app = TestApp::new().await;
    let (owner, other) = (app.user(0), app.user(1));
    let order = create_order(&app, owner, "monthly").await;

    let (status, body) = capture(&app, owner, "  ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "orderId is required");

    let (status, _) = capture(&app, owner, "ORDER-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = capture(&app, other, order["orderId"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to capture this payment."
    );
    assert_eq!(app.provider.captures(), 0);
}

#[tokio::test]
async fn test_free_plan_when_no_subscription() {
    let app = TestApp::new().await;

    let response = app
        .get("/api/payments/subscription", Some(app.user(0)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"], json!({ "plan": "free", "status": "active" }));
}

#[tokio::test]
async fn test_cancel_subscription() {
    let app = TestApp::new().await;
    let user = app.user(0);

    let response = app
        .json(
            Method::POST,
            "/api/payments/subscription/cancel",
            Some(user),
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "No active subscription");

    let order = create_order(&app, user, "monthly").await;
    capture(&app, user, order["orderId"].as_str().unwrap()).await;

    let response = app
        .json(
            Method::POST,
            "/api/payments/subscription/cancel",
            Some(user),
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "cancelled");
    assert_eq!(response.body["data"]["autoRenew"], false);

    let current = app.get("/api/payments/subscription", Some(user)).await;
    assert_eq!(current.body["data"]["plan"], "free");
}

#[tokio::test]
async fn test_webhook_applies_once() {
    let app = TestApp::new().await;
    let user = app.user(0);
    let order = create_order(&app, user, "monthly").await;

    let payload = json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": {
            "id": "CAP-9",
            "status": "COMPLETED",
            "supplementary_data": { "related_ids": { "order_id": order["orderId"] } }
        }
    });

    let body = webhook(&app, "paypal", payload.clone()).await;
    assert_eq!(body, json!({ "success": true }));

    let history = app.get("/api/payments/history", Some(user)).await;
    assert_eq!(history.body["data"][0]["status"], "paid");
    assert_eq!(history.body["data"][0]["metadata"]["captureId"], "CAP-9");

    let current = app.get("/api/payments/subscription", Some(user)).await;
    assert_eq!(current.body["data"]["plan"], "monthly");

    let body = webhook(&app, "paypal", payload).await;
    assert_eq!(body, json!({ "success": true, "alreadyProcessed": true }));
}

#[tokio::test]
async fn test_webhook_failures_still_answer_ok() {
    let app = TestApp::new().await;

    let body = webhook(&app, "paypal", json!({ "resource": {} })).await;
    assert_eq!(body, json!({ "success": false }));

    let body = webhook(
        &app,
        "stripe",
        json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED", "resource": { "id": "X" } }),
    )
    .await;
    assert_eq!(body, json!({ "success": false }));

    // Events for payments we never created are acknowledged
    let body = webhook(
        &app,
        "paypal",
        json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED", "resource": { "id": "UNKNOWN" } }),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn test_refund_cancels_subscription() {
    let app = TestApp::new().await;
    let (owner, other) = (app.user(0), app.user(1));
    let order = create_order(&app, owner, "monthly").await;
    capture(&app, owner, order["orderId"].as_str().unwrap()).await;

    let uri = format!(
        "/api/payments/{}/refund",
        order["paymentId"].as_str().unwrap()
    );

    let response = app.json(Method::POST, &uri, Some(other), json!({})).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.json(Method::POST, &uri, Some(owner), json!({})).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["data"]["status"], "refunded");
    assert_eq!(
        response.body["data"]["metadata"]["refundId"],
        "REFUND-CAPTURE-ORDER-1"
    );
    assert_eq!(app.provider.refunds(), 1);

    let current = app.get("/api/payments/subscription", Some(owner)).await;
    assert_eq!(current.body["data"]["plan"], "free");

    let response = app.json(Method::POST, &uri, Some(owner), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Only paid payments can be refunded.");
}

#[tokio::test]
async fn test_new_subscription_replaces_active_one() {
    let app = TestApp::new().await;
    let user = app.user(0);

    let first = create_order(&app, user, "monthly").await;
    capture(&app, user, first["orderId"].as_str().unwrap()).await;
    let second = create_order(&app, user, "yearly").await;
    capture(&app, user, second["orderId"].as_str().unwrap()).await;

    let current = app.get("/api/payments/subscription", Some(user)).await;
    assert_eq!(current.body["data"]["plan"], "yearly");

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = ? AND status = 'active'",
    )
    .bind(user.id.to_string())
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

async fn buy(app: &TestApp, user: &TestUser, plan: &str) -> Value {
    let order = create_order(app, user, plan).await;
    let (status, body) = capture(app, user, order["orderId"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"].clone()
}

async fn subscription_status(app: &TestApp, id: &str) -> String {
    sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = ?")
        .bind(id)
        .fetch_one(&app.state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_refund_webhook_cancels_subscription() {
    let app = TestApp::new().await;
    let user = app.user(0);
    let payment = buy(&app, user, "monthly").await;
    let subscription_id = payment["subscriptionId"].as_str().unwrap().to_string();

    let payload = json!({
        "event_type": "PAYMENT.CAPTURE.REFUNDED",
        "resource": {
            "id": "REFUND-77",
            "status": "COMPLETED",
            "links": [
                { "rel": "self", "href": "https://api-m.sandbox.paypal.com/v2/payments/refunds/REFUND-77" },
                { "rel": "up", "href": "https://api-m.sandbox.paypal.com/v2/payments/captures/CAPTURE-ORDER-1" }
            ]
        }
    });

    let body = webhook(&app, "paypal", payload.clone()).await;
    assert_eq!(body, json!({ "success": true }));

    let history = app.get("/api/payments/history", Some(user)).await;
    assert_eq!(history.body["data"][0]["status"], "refunded");
    assert_eq!(history.body["data"][0]["metadata"]["refundId"], "REFUND-77");
    assert_eq!(subscription_status(&app, &subscription_id).await, "cancelled");

    let current = app.get("/api/payments/subscription", Some(user)).await;
    assert_eq!(current.body["data"]["plan"], "free");

    let body = webhook(&app, "paypal", payload).await;
    assert_eq!(body, json!({ "success": true, "alreadyProcessed": true }));
    assert_eq!(app.provider.refunds(), 0);
}

#[tokio::test]
async fn test_cleanup_expires_overdue_subscriptions() {
    let app = TestApp::new().await;
    let (lapsed, current) = (app.user(0), app.user(1));
    let old = buy(&app, lapsed, "monthly").await;
    let fresh = buy(&app, current, "yearly").await;
    let old_id = old["subscriptionId"].as_str().unwrap().to_string();
    let fresh_id = fresh["subscriptionId"].as_str().unwrap().to_string();

    let yesterday = chrono::Utc::now() - chrono::Duration::days(1);
    sqlx::query("UPDATE subscriptions SET end_date = ? WHERE id = ?")
        .bind(cobham_common::time::to_db(&yesterday))
        .bind(&old_id)
        .execute(&app.state.db)
        .await
        .unwrap();

    let expired = cobham_api::services::subscriptions::cleanup_expired(&app.state.db)
        .await
        .unwrap();
    assert_eq!(expired, 1);
    assert_eq!(subscription_status(&app, &old_id).await, "expired");
    assert_eq!(subscription_status(&app, &fresh_id).await, "active");

    let response = app.get("/api/payments/subscription", Some(lapsed)).await;
    assert_eq!(response.body["data"]["plan"], "free");

    // Nothing left to expire
    let expired = cobham_api::services::subscriptions::cleanup_expired(&app.state.db)
        .await
        .unwrap();
    assert_eq!(expired, 0);
}

#[tokio::test]
async fn test_checkout_requires_profile() {
    let app = TestApp::new().await;
    let user = app.user(0);
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id.to_string())
        .execute(&app.state.db)
        .await
        .unwrap();

    let response = app
        .json(
            Method::POST,
            "/api/payments/create-order",
            Some(user),
            json!({ "plan": "monthly" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "User not found");

    let refund = format!("/api/payments/{}/refund", Uuid::new_v4());
    let response = app.json(Method::POST, &refund, Some(user), json!({})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
