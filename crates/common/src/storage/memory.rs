//! In-memory object store
//!
//! Presigned URLs take the form `memory://{container}/{key}?expires={unix}`
//! and are honoured only by [`MemoryObjectStore::fetch_presigned`].

use super::{Container, ObjectStore};
use crate::errors::{AppError, Result};
use crate::signing;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;

const SCHEME: &str = "memory://";

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(Container, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects in `container`
    pub async fn count(&self, container: Container) -> usize {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(c, _)| *c == container)
            .count()
    }

    /// Content type recorded at put time
    pub async fn content_type(&self, container: Container, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&(container, key.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// Resolve a URL minted by `presign`, enforcing its expiry
    pub async fn fetch_presigned(&self, url: &str) -> Result<Bytes> {
        let rest = url.strip_prefix(SCHEME).ok_or(AppError::InvalidSignature)?;
        let (path, query) = rest.split_once('?').ok_or(AppError::InvalidSignature)?;
        let (container, key) = path.split_once('/').ok_or(AppError::InvalidSignature)?;

        let container = match container {
            "raw" => Container::Raw,
            "processed" => Container::Processed,
            _ => return Err(AppError::InvalidSignature),
        };

        let expires = query
            .strip_prefix("expires=")
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or(AppError::InvalidSignature)?;

        if chrono::Utc::now().timestamp() >= expires {
            return Err(AppError::ExpiredSignature);
        }

        self.get(container, key).await
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_bytes(
        &self,
        container: Container,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        self.objects.write().await.insert(
            (container, key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn put_file(
        &self,
        container: Container,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::storage("read spool", key, e))?;
        self.put_bytes(container, key, Bytes::from(data), content_type)
            .await
    }

    async fn get(&self, container: Container, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(&(container, key.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| AppError::ObjectNotFound { key: key.to_string() })
    }

    async fn presign(&self, container: Container, key: &str, ttl: Duration) -> Result<String> {
        let expires = signing::expiry_after(chrono::Utc::now().timestamp(), ttl);
        Ok(format!("{}{}/{}?expires={}", SCHEME, container.as_str(), key, expires))
    }

    async fn ensure_containers(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_overwrites_by_key() {
        let store = MemoryObjectStore::new();
        store
            .put_bytes(Container::Processed, "k.txt", Bytes::from_static(b"one"), "text/plain")
            .await
            .unwrap();
        store
            .put_bytes(Container::Processed, "k.txt", Bytes::from_static(b"two"), "text/plain")
            .await
            .unwrap();

        assert_eq!(store.count(Container::Processed).await, 1);
        assert_eq!(&store.get(Container::Processed, "k.txt").await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn test_containers_are_separate() {
        let store = MemoryObjectStore::new();
        store
            .put_bytes(Container::Raw, "a", Bytes::from_static(b"raw"), "application/pdf")
            .await
            .unwrap();

        let err = store.get(Container::Processed, "a").await.unwrap_err();
        assert!(matches!(err, AppError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_presigned_url_roundtrip() {
        let store = MemoryObjectStore::new();
        store
            .put_bytes(Container::Processed, "uploads/x/a.txt", Bytes::from_static(b"hi"), "text/plain")
            .await
            .unwrap();

        let url = store
            .presign(Container::Processed, "uploads/x/a.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("memory://processed/uploads/x/a.txt?expires="));
        assert_eq!(&store.fetch_presigned(&url).await.unwrap()[..], b"hi");
    }

    #[tokio::test]
    async fn test_expired_presigned_url_is_refused() {
        let store = MemoryObjectStore::new();
        store
            .put_bytes(Container::Processed, "a.txt", Bytes::from_static(b"hi"), "text/plain")
            .await
            .unwrap();

        let past = chrono::Utc::now().timestamp() - 1;
        let url = format!("memory://processed/a.txt?expires={}", past);
        let err = store.fetch_presigned(&url).await.unwrap_err();
        assert!(matches!(err, AppError::ExpiredSignature));
    }

    #[tokio::test]
    async fn test_presign_with_unbounded_ttl_saturates() {
        let store = MemoryObjectStore::new();
        store
            .put_bytes(Container::Processed, "a.txt", Bytes::from_static(b"hi"), "text/plain")
            .await
            .unwrap();

        let url = store
            .presign(Container::Processed, "a.txt", Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert!(url.ends_with(&format!("?expires={}", i64::MAX)));
        assert_eq!(&store.fetch_presigned(&url).await.unwrap()[..], b"hi");
    }

    #[tokio::test]
    async fn test_put_file_reads_spool() {
        let dir = std::env::temp_dir().join(format!("vaultdrop-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&dir, b"%PDF-1.4").await.unwrap();

        let store = MemoryObjectStore::new();
        store
            .put_file(Container::Raw, "r.pdf", &dir, "application/pdf")
            .await
            .unwrap();
        assert_eq!(&store.get(Container::Raw, "r.pdf").await.unwrap()[..], b"%PDF-1.4");
        assert_eq!(
            store.content_type(Container::Raw, "r.pdf").await.as_deref(),
            Some("application/pdf")
        );

        tokio::fs::remove_file(&dir).await.unwrap();
    }
}
