//! Payment providers
//!
//! Each provider adapts an external checkout API to the same small
//! interface: create an order, capture it, refund a capture, and turn a
//! webhook delivery into a normalized status update.

mod paypal;

pub use paypal::{parse_webhook as parse_paypal_webhook, PaypalProvider};

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::PaymentStatus;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider '{0}' not supported")]
    UnsupportedProvider(String),

    #[error("Payment provider not configured: {0}")]
    NotConfigured(String),

    #[error("Payment provider network error: {0}")]
    NetworkError(String),

    #[error("Payment provider API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Payment provider parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    InvalidWebhook(String),
}

/// Order request sent to a provider
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

/// Order created at the provider, awaiting buyer approval
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    pub order_id: String,
    /// Provider status string, see [`PaymentProvider::normalize_status`]
    pub status: String,
    /// Approval/capture links for the client
    pub links: Value,
}

#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub capture_id: Option<String>,
    pub status: String,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: String,
}

/// Webhook delivery reduced to what the payment records need
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    /// Provider resource id (the capture for capture events, the refund for
    /// refund events)
    pub transaction_id: String,
    /// Capture the resource belongs to
    pub capture_id: Option<String>,
    /// Order the resource belongs to, when the provider reports it
    pub order_id: Option<String>,
    pub status: PaymentStatus,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Lower-case provider name used in URLs and stored on payments
    fn name(&self) -> &str;

    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder, PaymentError>;

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PaymentError>;

    async fn refund(&self, capture_id: &str) -> Result<RefundResult, PaymentError>;

    /// Authenticate (where configured) and normalize a webhook payload
    async fn verify_webhook(
        &self,
        headers: &HeaderMap,
        payload: &Value,
    ) -> Result<WebhookEvent, PaymentError>;

    /// Map an order, capture or refund status string onto [`PaymentStatus`]
    fn normalize_status(&self, status: &str) -> PaymentStatus;
}

/// Providers keyed by lower-case name
#[derive(Clone, Default)]
pub struct PaymentRegistry {
    providers: Arc<HashMap<String, Arc<dyn PaymentProvider>>>,
}

impl PaymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(self, provider: Arc<dyn PaymentProvider>) -> Self {
        let mut providers = (*self.providers).clone();
        providers.insert(provider.name().to_lowercase(), provider);
        Self {
            providers: Arc::new(providers),
        }
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        self.providers
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| PaymentError::UnsupportedProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl PaymentProvider for Dummy {
        fn name(&self) -> &str {
            "PayPal"
        }

        async fn create_order(&self, _: &OrderRequest) -> Result<ProviderOrder, PaymentError> {
            unimplemented!()
        }

        async fn capture_order(&self, _: &str) -> Result<CaptureResult, PaymentError> {
            unimplemented!()
        }

        async fn refund(&self, _: &str) -> Result<RefundResult, PaymentError> {
            unimplemented!()
        }

        async fn verify_webhook(&self, _: &HeaderMap, _: &Value) -> Result<WebhookEvent, PaymentError> {
            unimplemented!()
        }

        fn normalize_status(&self, _: &str) -> PaymentStatus {
            PaymentStatus::Created
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = PaymentRegistry::new().with_provider(Arc::new(Dummy));

        assert!(registry.get("paypal").is_ok());
        assert!(registry.get("PAYPAL").is_ok());
        assert_eq!(registry.names(), vec!["paypal".to_string()]);

        let err = registry.get("Stripe").err().unwrap();
        assert_eq!(err.to_string(), "Payment provider 'Stripe' not supported");
    }
}
