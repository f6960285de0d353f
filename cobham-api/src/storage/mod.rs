//! Media object storage
//!
//! Audio files and artwork are kept in an external object store. The
//! database only records object paths; clients receive short-lived signed
//! URLs generated on every read.

mod filename;
mod local;
mod supabase;

pub use filename::{sanitize_file_name, sanitize_object_path};
pub use local::LocalStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use axum::body::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::upload::UploadedFile;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage network error: {0}")]
    NetworkError(String),

    #[error("Storage API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}

/// Backend that stores objects in named buckets
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object; fails if the path is already taken
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// URL granting temporary read access
    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError>;
}

/// Logical bucket an object belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Audio,
    Artwork,
}

/// Folder prefixes inside the buckets
pub mod folders {
    pub const AUDIO: &str = "audio";
    pub const ARTWORK: &str = "artwork";
    pub const AVATARS: &str = "avatars";
    pub const ALBUMS: &str = "albums";
    pub const PLAYLISTS: &str = "playlists";
}

/// Facade used by handlers: bucket naming, path sanitizing, lenient signing
#[derive(Clone)]
pub struct MediaStorage {
    store: Arc<dyn ObjectStore>,
    audio_bucket: String,
    artwork_bucket: String,
    signed_url_ttl: Duration,
}

impl MediaStorage {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        audio_bucket: impl Into<String>,
        artwork_bucket: impl Into<String>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            audio_bucket: audio_bucket.into(),
            artwork_bucket: artwork_bucket.into(),
            signed_url_ttl,
        }
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Audio => &self.audio_bucket,
            Bucket::Artwork => &self.artwork_bucket,
        }
    }

    /// Upload a file, returning the stored object path
    ///
    /// Only the last component of `path` is sanitized.
    pub async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        file: &UploadedFile,
    ) -> Result<String, StorageError> {
        let path = sanitize_object_path(path);
        if path.is_empty() || path.ends_with('/') || path.split('/').any(|c| c == "..") {
            return Err(StorageError::InvalidPath(path));
        }

        let bucket_name = self.bucket_name(bucket);
        debug!(
            bucket = bucket_name,
            path = %path,
            content_type = %file.content_type,
            size = file.bytes.len(),
            "Uploading object"
        );

        self.store
            .put(bucket_name, &path, file.bytes.clone(), &file.content_type)
            .await
            .map_err(|e| {
                error!(bucket = bucket_name, path = %path, "Upload failed: {}", e);
                e
            })?;

        Ok(path)
    }

    /// Signed URL for a stored path
    ///
    /// Absent paths yield `None`; so do signing failures, which are logged.
    /// Absolute URLs (e.g. identity-provider avatars) pass through unchanged.
    pub async fn sign(&self, bucket: Bucket, path: Option<&str>) -> Option<String> {
        let path = path.filter(|p| !p.is_empty())?;
        if is_external_url(path) {
            return Some(path.to_string());
        }

        let bucket_name = self.bucket_name(bucket);
        match self
            .store
            .signed_url(bucket_name, path, self.signed_url_ttl)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(bucket = bucket_name, path, "Failed to sign URL: {}", e);
                None
            }
        }
    }

    /// Delete a stored object; failures are logged and otherwise ignored
    pub async fn delete(&self, bucket: Bucket, path: Option<&str>) {
        let Some(path) = path.filter(|p| !p.is_empty() && !is_external_url(p)) else {
            return;
        };

        let bucket_name = self.bucket_name(bucket);
        if let Err(e) = self.store.remove(bucket_name, path).await {
            error!(bucket = bucket_name, path, "Failed to delete object: {}", e);
        }
    }
}

fn is_external_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}
