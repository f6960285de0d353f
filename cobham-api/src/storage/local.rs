//! Filesystem object store
//!
//! Objects live at `<root>/<bucket>/<path>` and are served by the API under
//! `/media`. URLs are plain (unsigned) links.

use async_trait::async_trait;
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, StorageError};

pub struct LocalStore {
    root: PathBuf,
    public_url: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(bucket).join(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(relative.display().to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        _expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.object_path(bucket, path)?;
        Ok(format!("{}/media/{}/{}", self.public_url, bucket, path))
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        let target = self.object_path(bucket, path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), "http://x");

        store
            .put("audio", "audio/1-a.mp3", Bytes::from_static(b"1"), "audio/mpeg")
            .await
            .unwrap();
        let second = store
            .put("audio", "audio/1-a.mp3", Bytes::from_static(b"2"), "audio/mpeg")
            .await;
        assert!(second.is_err());

        store.remove("audio", "audio/1-a.mp3").await.unwrap();
        assert!(!dir.path().join("audio/audio/1-a.mp3").exists());
    }

    #[tokio::test]
    async fn test_rejects_absolute_and_parent_paths() {
        let store = LocalStore::new("/tmp/unused", "http://x");
        assert!(store.signed_url("audio", "/etc/passwd", Duration::ZERO).await.is_err());
        assert!(store.signed_url("audio", "a/../../b", Duration::ZERO).await.is_err());
    }
}
