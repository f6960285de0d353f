//! Payment and subscription endpoints

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use cobham_common::api::ApiResponse;
use serde::Deserialize;
use serde_json::{json, Value};

use super::authenticated;
use crate::dto::{CreatedOrder, CurrentSubscription, PaymentDto, SubscriptionDto};
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::identity::AuthUser;
use crate::services::payments::{self as payment_service, WebhookOutcome};
use crate::services::{profiles, subscriptions as subscription_service};
use crate::validation;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub plan: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBody {
    pub order_id: Option<String>,
    pub plan: Option<String>,
    pub provider: Option<String>,
}

/// POST /api/payments/create-order
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateOrderBody>,
) -> ApiResult<ApiResponse<CreatedOrder>> {
    let order = payment_service::create_order(
        &state,
        &user,
        body.plan.as_deref(),
        body.provider.as_deref(),
    )
    .await?;
    Ok(ApiResponse::created(order))
}

/// POST /api/payments/capture
pub async fn capture(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CaptureBody>,
) -> ApiResult<ApiResponse<PaymentDto>> {
    let payment = payment_service::capture(
        &state,
        &user,
        body.order_id.as_deref(),
        body.plan.as_deref(),
        body.provider.as_deref(),
    )
    .await?;
    Ok(ApiResponse::with_message(payment, "Payment captured."))
}

/// POST /api/payments/webhook/:provider
///
/// Always answers 200 so the provider does not retry events we cannot use.
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Webhook body is not JSON");
            return Json(json!({ "success": false })).into_response();
        }
    };

    match payment_service::handle_webhook(&state, &provider, &headers, &payload).await {
        Ok(WebhookOutcome::AlreadyProcessed) => {
            Json(json!({ "success": true, "alreadyProcessed": true })).into_response()
        }
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "Webhook handling failed");
            Json(json!({ "success": false })).into_response()
        }
    }
}

/// GET /api/payments/history
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<PaymentDto>>> {
    Ok(ApiResponse::ok(payment_service::history(&state, &user).await?))
}

/// GET /api/payments/subscription
pub async fn current_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<CurrentSubscription>> {
    let subscription = subscription_service::current(&state.db, user.id).await?;
    Ok(ApiResponse::ok(subscription.into()))
}

/// POST /api/payments/subscription/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<SubscriptionDto>> {
    let subscription = subscription_service::cancel_current(&state.db, user.id).await?;
    profiles::invalidate(&state, user.id).await;
    Ok(ApiResponse::with_message(
        subscription.into(),
        "Subscription cancelled.",
    ))
}

/// POST /api/payments/:id/refund
pub async fn refund(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<PaymentDto>> {
    let payment_id = validation::uuid(&id, "payment id")?;
    let payment = payment_service::refund(&state, &user, payment_id).await?;
    Ok(ApiResponse::with_message(payment, "Payment refunded."))
}

pub fn payment_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/api/payments/webhook/:provider", post(webhook));

    let protected = authenticated(
        state,
        Router::new()
            .route("/api/payments/create-order", post(create_order))
            .route("/api/payments/capture", post(capture))
            .route("/api/payments/history", get(history))
            .route("/api/payments/subscription", get(current_subscription))
            .route("/api/payments/subscription/cancel", post(cancel_subscription))
            .route("/api/payments/:id/refund", post(refund)),
    );

    public.merge(protected)
}
