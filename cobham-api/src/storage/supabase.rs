//! Supabase Storage REST client
//!
//! Uses the service-role key, so it must only run server side.

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ObjectStore, StorageError};

const USER_AGENT: &str = concat!("cobham-api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

pub struct SupabaseStore {
    http_client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, StorageError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn storage_url(&self, suffix: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, suffix)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::ApiError(status.as_u16(), body))
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.storage_url(&format!("object/{}/{}", bucket, path));

        let response = self
            .authorized(self.http_client.post(&url))
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        check(response).await?;
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let url = self.storage_url(&format!("object/sign/{}/{}", bucket, path));

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&json!({ "expiresIn": expires_in.as_secs() }))
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        let signed: SignedUrlResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::NetworkError(format!("Invalid sign response: {}", e)))?;

        // The API answers with a path relative to /storage/v1
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        let url = self.storage_url(&format!("object/{}", bucket));

        let response = self
            .authorized(self.http_client.delete(&url))
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        check(response).await?;
        Ok(())
    }
}
