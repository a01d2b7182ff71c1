//! Object store client
//!
//! Key-addressed blob storage with two logical containers: raw uploads and
//! processed text artifacts. Puts overwrite by key, so re-running an
//! extraction replaces the artifact instead of adding a second one.

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use crate::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

/// Logical container a key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Raw,
    Processed,
}

impl Container {
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Raw => "raw",
            Container::Processed => "processed",
        }
    }
}

/// Storage backend for raw uploads and derived artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create or overwrite `key` with an in-memory buffer
    async fn put_bytes(
        &self,
        container: Container,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()>;

    /// Create or overwrite `key` by streaming a local file
    async fn put_file(
        &self,
        container: Container,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()>;

    /// Read `key`; `ObjectNotFound` when absent
    async fn get(&self, container: Container, key: &str) -> Result<Bytes>;

    /// Time-bounded read URL enforced by the store itself
    async fn presign(&self, container: Container, key: &str, ttl: Duration) -> Result<String>;

    /// Verify both containers exist; called once at startup
    async fn ensure_containers(&self) -> Result<()>;
}

/// Raw upload location: `uploads/{id}/{file_name}`
pub fn raw_key(id: &uuid::Uuid, file_name: &str) -> String {
    format!("uploads/{}/{}", id, file_name)
}

/// Artifact location: the raw key with its final extension replaced by `.txt`
pub fn processed_key(raw_key: &str) -> String {
    let (dir, base) = match raw_key.rfind('/') {
        Some(idx) => raw_key.split_at(idx + 1),
        None => ("", raw_key),
    };

    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    format!("{}{}.txt", dir, stem)
}
