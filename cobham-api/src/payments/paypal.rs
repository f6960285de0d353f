//! PayPal Orders v2 client
//!
//! Authenticates with OAuth client credentials; the access token is cached
//! until shortly before it expires.

use async_trait::async_trait;
use axum::http::HeaderMap;
use cobham_common::config::{PaypalConfig, PaypalMode};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{
    CaptureResult, OrderRequest, PaymentError, PaymentProvider, ProviderOrder, RefundResult,
    WebhookEvent,
};
use crate::db::models::{format_cents, PaymentStatus};

const SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_URL: &str = "https://api-m.paypal.com";
const USER_AGENT: &str = concat!("cobham-api/", env!("CARGO_PKG_VERSION"));

/// Refresh the token this long before PayPal says it expires
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct PaypalProvider {
    http_client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    webhook_id: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

impl PaypalProvider {
    pub fn from_config(config: &PaypalConfig) -> Result<Self, PaymentError> {
        let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret)
        else {
            return Err(PaymentError::NotConfigured(
                "PayPal client id and secret are required".to_string(),
            ));
        };

        let base_url = match config.mode {
            PaypalMode::Sandbox => SANDBOX_URL,
            PaypalMode::Live => LIVE_URL,
        };

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            webhook_id: config.webhook_id.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting PayPal access token");
        let response = self
            .http_client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let token: TokenResponse = parse(response).await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_MARGIN);
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        });

        Ok(access_token)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        parse(response).await
    }
}

async fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PaymentError::ApiError(status.as_u16(), body));
    }

    response
        .json()
        .await
        .map_err(|e| PaymentError::ParseError(e.to_string()))
}

/// PayPal order/capture/refund status to payment status
pub fn paypal_status(status: &str) -> PaymentStatus {
    match status {
        "COMPLETED" => PaymentStatus::Paid,
        "VOIDED" | "FAILED" | "DENIED" | "CANCELLED" => PaymentStatus::Failed,
        "REFUNDED" | "PARTIALLY_REFUNDED" => PaymentStatus::Refunded,
        // CREATED, SAVED, APPROVED, PAYER_ACTION_REQUIRED, PENDING and anything unknown
        _ => PaymentStatus::Created,
    }
}

/// Webhook event type to payment status
pub fn event_status(event_type: &str) -> PaymentStatus {
    match event_type {
        "PAYMENT.CAPTURE.COMPLETED" => PaymentStatus::Paid,
        "PAYMENT.CAPTURE.DENIED" => PaymentStatus::Failed,
        "PAYMENT.CAPTURE.REFUNDED" => PaymentStatus::Refunded,
        _ => PaymentStatus::Created,
    }
}

/// Pull the capture id and status out of a capture response
fn capture_details(raw: &Value) -> (Option<String>, Option<String>) {
    let capture = &raw["purchase_units"][0]["payments"]["captures"][0];
    let id = capture["id"].as_str().map(str::to_string);
    let status = capture["status"]
        .as_str()
        .or_else(|| raw["status"].as_str())
        .map(str::to_string);
    (id, status)
}

/// Capture id from a refund's `up` link (`.../v2/payments/captures/<id>`)
fn refunded_capture(resource: &Value) -> Option<String> {
    resource["links"]
        .as_array()?
        .iter()
        .filter(|link| link["rel"].as_str() == Some("up"))
        .filter_map(|link| link["href"].as_str())
        .find_map(|href| href.split_once("/captures/"))
        .map(|(_, rest)| rest.trim_end_matches('/').to_string())
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

/// Normalize a webhook payload without checking its signature
///
/// Capture events carry the capture as their resource; refund events carry
/// the refund and link back to the capture it reverses.
pub fn parse_webhook(payload: &Value) -> Result<WebhookEvent, PaymentError> {
    let event_type = payload["event_type"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidWebhook("Missing event_type".to_string()))?
        .to_string();
    let resource = &payload["resource"];
    let transaction_id = resource["id"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidWebhook("Missing resource.id".to_string()))?
        .to_string();
    let order_id = resource["supplementary_data"]["related_ids"]["order_id"]
        .as_str()
        .map(str::to_string);

    let status = event_status(&event_type);
    let capture_id = match status {
        PaymentStatus::Refunded => refunded_capture(resource),
        _ => Some(transaction_id.clone()),
    };

    Ok(WebhookEvent {
        status,
        event_type,
        transaction_id,
        capture_id,
        order_id,
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, PaymentError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::InvalidWebhook(format!("Missing {} header", name)))
}

#[async_trait]
impl PaymentProvider for PaypalProvider {
    fn name(&self) -> &str {
        "paypal"
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder, PaymentError> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.payment_id.to_string(),
                "custom_id": request.user_id.to_string(),
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": format_cents(request.amount_cents),
                }
            }]
        });

        let result: Value = self.post_json("/v2/checkout/orders", &body).await?;
        let order_id = result["id"]
            .as_str()
            .ok_or_else(|| PaymentError::ParseError("Order response without id".to_string()))?
            .to_string();

        Ok(ProviderOrder {
            order_id,
            status: result["status"].as_str().unwrap_or_default().to_string(),
            links: result["links"].clone(),
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PaymentError> {
        let raw: Value = self
            .post_json(&format!("/v2/checkout/orders/{}/capture", order_id), &json!({}))
            .await?;

        let (capture_id, status) = capture_details(&raw);
        Ok(CaptureResult {
            capture_id,
            status: status.unwrap_or_default(),
            raw,
        })
    }

    async fn refund(&self, capture_id: &str) -> Result<RefundResult, PaymentError> {
        let result: Value = self
            .post_json(&format!("/v2/payments/captures/{}/refund", capture_id), &json!({}))
            .await?;

        Ok(RefundResult {
            refund_id: result["id"].as_str().unwrap_or_default().to_string(),
            status: result["status"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn verify_webhook(
        &self,
        headers: &HeaderMap,
        payload: &Value,
    ) -> Result<WebhookEvent, PaymentError> {
        let Some(webhook_id) = &self.webhook_id else {
            warn!("PayPal webhook id not configured; accepting webhook without signature check");
            return parse_webhook(payload);
        };

        let body = json!({
            "auth_algo": header(headers, "paypal-auth-algo")?,
            "cert_url": header(headers, "paypal-cert-url")?,
            "transmission_id": header(headers, "paypal-transmission-id")?,
            "transmission_sig": header(headers, "paypal-transmission-sig")?,
            "transmission_time": header(headers, "paypal-transmission-time")?,
            "webhook_id": webhook_id,
            "webhook_event": payload,
        });

        let result: Value = self
            .post_json("/v1/notifications/verify-webhook-signature", &body)
            .await?;

        if result["verification_status"].as_str() != Some("SUCCESS") {
            return Err(PaymentError::InvalidWebhook(
                "Webhook signature verification failed".to_string(),
            ));
        }

        parse_webhook(payload)
    }

    fn normalize_status(&self, status: &str) -> PaymentStatus {
        paypal_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_map() {
        for s in ["CREATED", "SAVED", "APPROVED", "PAYER_ACTION_REQUIRED", "PENDING", "WHATEVER"] {
            assert_eq!(paypal_status(s), PaymentStatus::Created, "{}", s);
        }
        for s in ["VOIDED", "FAILED", "DENIED", "CANCELLED"] {
            assert_eq!(paypal_status(s), PaymentStatus::Failed, "{}", s);
        }
        assert_eq!(paypal_status("COMPLETED"), PaymentStatus::Paid);
        assert_eq!(paypal_status("REFUNDED"), PaymentStatus::Refunded);
        assert_eq!(paypal_status("PARTIALLY_REFUNDED"), PaymentStatus::Refunded);
    }

    #[test]
    fn test_parse_webhook() {
        let event = parse_webhook(&json!({
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": "CAP-1",
                "supplementary_data": { "related_ids": { "order_id": "ORDER-1" } }
            }
        }))
        .unwrap();

        assert_eq!(event.status, PaymentStatus::Paid);
        assert_eq!(event.transaction_id, "CAP-1");
        assert_eq!(event.capture_id.as_deref(), Some("CAP-1"));
        assert_eq!(event.order_id.as_deref(), Some("ORDER-1"));

        assert_eq!(event_status("PAYMENT.CAPTURE.DENIED"), PaymentStatus::Failed);
        assert_eq!(event_status("PAYMENT.CAPTURE.REFUNDED"), PaymentStatus::Refunded);
        assert_eq!(event_status("CHECKOUT.ORDER.APPROVED"), PaymentStatus::Created);
    }

    #[test]
    fn test_parse_refund_webhook_links_capture() {
        let event = parse_webhook(&json!({
            "event_type": "PAYMENT.CAPTURE.REFUNDED",
            "resource": {
                "id": "REFUND-1",
                "status": "COMPLETED",
                "links": [
                    { "rel": "self", "href": "https://api-m.paypal.com/v2/payments/refunds/REFUND-1" },
                    { "rel": "up", "href": "https://api-m.paypal.com/v2/payments/captures/CAP-1" }
                ]
            }
        }))
        .unwrap();

        assert_eq!(event.status, PaymentStatus::Refunded);
        assert_eq!(event.transaction_id, "REFUND-1");
        assert_eq!(event.capture_id.as_deref(), Some("CAP-1"));
        assert_eq!(event.order_id, None);
    }

    #[test]
    fn test_refund_without_up_link_has_no_capture() {
        let event = parse_webhook(&json!({
            "event_type": "PAYMENT.CAPTURE.REFUNDED",
            "resource": { "id": "REFUND-2", "links": [{ "rel": "self", "href": "x" }] }
        }))
        .unwrap();
        assert_eq!(event.capture_id, None);
    }

    #[test]
    fn test_parse_webhook_requires_resource_id() {
        let result = parse_webhook(&json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED" }));
        assert!(matches!(result, Err(PaymentError::InvalidWebhook(_))));
    }

    #[test]
    fn test_capture_details() {
        let raw = json!({
            "status": "COMPLETED",
            "purchase_units": [{ "payments": { "captures": [{ "id": "CAP-9", "status": "PENDING" }] } }]
        });
        assert_eq!(
            capture_details(&raw),
            (Some("CAP-9".to_string()), Some("PENDING".to_string()))
        );

        let bare = json!({ "status": "COMPLETED" });
        assert_eq!(capture_details(&bare), (None, Some("COMPLETED".to_string())));
    }

    #[test]
    fn test_requires_credentials() {
        let result = PaypalProvider::from_config(&PaypalConfig::default());
        assert!(result.is_err());
    }
}
