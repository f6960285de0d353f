//! Subscription checkout
//!
//! A payment row is created before the provider order so every order can be
//! traced back to the user who started it. Capturing (or a capture webhook)
//! moves it to `paid` and starts the subscription the plan buys.

use axum::http::HeaderMap;
use cobham_common::time;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::{profiles, subscriptions as subscription_service};
use crate::db::models::{PaymentStatus, Plan};
use crate::db::payments::{self, Payment};
use crate::db::subscriptions;
use crate::dto::{CreatedOrder, PaymentDto};
use crate::error::{ApiResult, AppError};
use crate::identity::AuthUser;
use crate::payments::{OrderRequest, WebhookEvent};
use crate::AppState;

pub const DEFAULT_PROVIDER: &str = "paypal";

/// Outcome reported back to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied(Uuid),
    AlreadyProcessed,
    /// Event did not match any local payment
    Unmatched,
}

fn idempotency_key(provider: &str, transaction_id: &str) -> String {
    format!("{}:{}", provider, transaction_id)
}

/// Plan recorded when the order was created
fn stored_plan(payment: &Payment) -> Plan {
    Plan::purchasable(payment.metadata_str("plan"))
}

pub async fn create_order(
    state: &AppState,
    caller: &AuthUser,
    plan: Option<&str>,
    provider: Option<&str>,
) -> ApiResult<CreatedOrder> {
    let provider = state.payments.get(provider.unwrap_or(DEFAULT_PROVIDER))?;
    profiles::require_user(state, caller.id).await?;

    let plan = Plan::purchasable(plan);
    let mut payment = Payment::new(caller.id, plan.price_cents(), provider.name());
    payment.set_metadata("plan", json!(plan.as_str()));
    payments::insert(&state.db, &payment).await?;

    let request = OrderRequest {
        payment_id: payment.id,
        user_id: caller.id,
        amount_cents: payment.amount_cents,
        currency: payment.currency.clone(),
        description: format!("Cobham {} subscription", plan),
    };

    let order = match provider.create_order(&request).await {
        Ok(order) => order,
        Err(e) => {
            payment.status = PaymentStatus::Failed;
            payments::update(&state.db, &mut payment).await?;
            return Err(e.into());
        }
    };

    payment.provider_transaction_id = Some(order.order_id.clone());
    payment.status = provider.normalize_status(&order.status);
    payment.set_metadata("orderId", json!(order.order_id));
    payments::update(&state.db, &mut payment).await?;

    info!(
        payment_id = %payment.id,
        order_id = %order.order_id,
        provider = provider.name(),
        plan = %plan,
        "Created payment order"
    );

    Ok(CreatedOrder {
        payment_id: payment.id,
        order_id: order.order_id,
        links: order.links,
    })
}

/// Capture an approved order and start the subscription it pays for
///
/// Capturing an order that is already paid returns the stored payment.
pub async fn capture(
    state: &AppState,
    caller: &AuthUser,
    order_id: Option<&str>,
    plan: Option<&str>,
    provider: Option<&str>,
) -> ApiResult<PaymentDto> {
    let order_id = order_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("orderId is required".to_string()))?;
    let provider = state.payments.get(provider.unwrap_or(DEFAULT_PROVIDER))?;

    let mut payment = payments::find_by_order(&state.db, provider.name(), order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    if payment.user_id != caller.id {
        return Err(AppError::Forbidden(
            "You do not have permission to capture this payment.".to_string(),
        ));
    }

    if payment.status == PaymentStatus::Paid {
        info!(payment_id = %payment.id, "Payment already captured");
        return Ok(payment.into());
    }

    let result = provider.capture_order(order_id).await?;

    payment.status = provider.normalize_status(&result.status);
    payment.processed_at = Some(time::now());
    payment.set_metadata("raw", result.raw);
    if let Some(capture_id) = &result.capture_id {
        payment.set_metadata("captureId", json!(capture_id));
        payment.idempotency_key = Some(idempotency_key(provider.name(), capture_id));
    }

    let plan = match plan {
        Some(name) => Plan::purchasable(Some(name)),
        None => stored_plan(&payment),
    };

    let mut tx = state.db.begin().await?;
    if payment.status == PaymentStatus::Paid {
        let subscription =
            subscription_service::activate(&mut tx, payment.user_id, plan, payment.id).await?;
        payment.subscription_id = Some(subscription.id);
    }
    payments::update(&mut *tx, &mut payment).await?;
    tx.commit().await?;

    info!(
        payment_id = %payment.id,
        status = %payment.status,
        "Captured payment"
    );
    profiles::invalidate(state, payment.user_id).await;

    Ok(payment.into())
}

/// Apply a provider webhook
pub async fn handle_webhook(
    state: &AppState,
    provider: &str,
    headers: &HeaderMap,
    payload: &Value,
) -> ApiResult<WebhookOutcome> {
    let provider = state.payments.get(provider)?;
    let event = provider.verify_webhook(headers, payload).await?;
    let key = idempotency_key(provider.name(), &event.transaction_id);

    if let Some(existing) = payments::find_by_idempotency_key(&state.db, &key).await? {
        if existing.processed_at.is_some() {
            info!(key = %key, event = %event.event_type, "Webhook already processed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
    }

    let Some(mut payment) = find_event_payment(state, provider.name(), &event).await? else {
        warn!(
            transaction_id = %event.transaction_id,
            event = %event.event_type,
            "Webhook did not match any payment"
        );
        return Ok(WebhookOutcome::Unmatched);
    };

    if payment.status == PaymentStatus::Refunded && event.status == PaymentStatus::Refunded {
        info!(payment_id = %payment.id, event = %event.event_type, "Refund already recorded");
        return Ok(WebhookOutcome::AlreadyProcessed);
    }

    apply_event(state, &mut payment, &event, key).await?;
    Ok(WebhookOutcome::Applied(payment.id))
}

/// Payment an event refers to: by its own id, then its capture, then its order
async fn find_event_payment(
    state: &AppState,
    provider: &str,
    event: &WebhookEvent,
) -> ApiResult<Option<Payment>> {
    if let Some(payment) =
        payments::find_by_transaction(&state.db, provider, &event.transaction_id).await?
    {
        return Ok(Some(payment));
    }

    if let Some(capture_id) = event
        .capture_id
        .as_ref()
        .filter(|id| **id != event.transaction_id)
    {
        if let Some(payment) = payments::find_by_transaction(&state.db, provider, capture_id).await?
        {
            return Ok(Some(payment));
        }
    }

    match &event.order_id {
        Some(order_id) => Ok(payments::find_by_order(&state.db, provider, order_id).await?),
        None => Ok(None),
    }
}

async fn apply_event(
    state: &AppState,
    payment: &mut Payment,
    event: &WebhookEvent,
    key: String,
) -> ApiResult<()> {
    let mut tx = state.db.begin().await?;

    match event.status {
        PaymentStatus::Paid => {
            payment.status = PaymentStatus::Paid;
            if payment.metadata_str("captureId").is_none() {
                let capture_id = event.capture_id.as_deref().unwrap_or(&event.transaction_id);
                payment.set_metadata("captureId", json!(capture_id));
            }
            if payment.subscription_id.is_none() {
                let plan = stored_plan(payment);
                let subscription =
                    subscription_service::activate(&mut tx, payment.user_id, plan, payment.id)
                        .await?;
                payment.subscription_id = Some(subscription.id);
            }
        }
        PaymentStatus::Refunded => {
            payment.status = PaymentStatus::Refunded;
            if payment.metadata_str("refundId").is_none() {
                payment.set_metadata("refundId", json!(event.transaction_id));
            }
            if let Some(subscription_id) = payment.subscription_id {
                subscriptions::cancel(&mut tx, subscription_id).await?;
            }
        }
        PaymentStatus::Failed if payment.status == PaymentStatus::Created => {
            payment.status = PaymentStatus::Failed;
        }
        _ => {}
    }

    payment.processed_at = Some(time::now());
    if payment.idempotency_key.is_none() {
        payment.idempotency_key = Some(key);
    }
    payments::update(&mut *tx, payment).await?;
    tx.commit().await?;

    info!(
        payment_id = %payment.id,
        event = %event.event_type,
        status = %payment.status,
        "Applied payment webhook"
    );
    profiles::invalidate(state, payment.user_id).await;

    Ok(())
}

/// Refund a paid payment and cancel the subscription it started
pub async fn refund(state: &AppState, caller: &AuthUser, payment_id: Uuid) -> ApiResult<PaymentDto> {
    let mut payment = payments::find_by_id(&state.db, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    if payment.user_id != caller.id {
        return Err(AppError::Forbidden(
            "You do not have permission to refund this payment.".to_string(),
        ));
    }
    if payment.status != PaymentStatus::Paid {
        return Err(AppError::BadRequest(
            "Only paid payments can be refunded.".to_string(),
        ));
    }

    let capture_id = payment
        .metadata_str("captureId")
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Payment has no capture to refund.".to_string()))?;

    let provider = state.payments.get(&payment.provider)?;
    let result = provider.refund(&capture_id).await?;
    if provider.normalize_status(&result.status) == PaymentStatus::Failed {
        return Err(AppError::Upstream(format!(
            "Refund {} was not completed ({})",
            result.refund_id, result.status
        )));
    }

    payment.status = PaymentStatus::Refunded;
    payment.set_metadata("refundId", json!(result.refund_id));

    let mut tx = state.db.begin().await?;
    if let Some(subscription_id) = payment.subscription_id {
        subscriptions::cancel(&mut tx, subscription_id).await?;
    }
    payments::update(&mut *tx, &mut payment).await?;
    tx.commit().await?;

    info!(payment_id = %payment.id, refund_id = %result.refund_id, "Refunded payment");
    profiles::invalidate(state, payment.user_id).await;

    Ok(payment.into())
}

/// A user's payments, newest first
pub async fn history(state: &AppState, caller: &AuthUser) -> ApiResult<Vec<PaymentDto>> {
    let payments = payments::list_by_user(&state.db, caller.id).await?;
    Ok(payments.into_iter().map(Into::into).collect())
}
