//! VaultDrop Common Library
//!
//! Shared code for the VaultDrop gateway and extraction worker:
//! - Configuration management
//! - Error types and handling
//! - Document entity and repository (Postgres or in-memory)
//! - Object store client (S3 or in-memory)
//! - Extraction job queue (SQS or bounded in-memory channel)
//! - HMAC signed URL issuer
//! - Metrics and observability

pub mod backends;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod queue;
pub mod signing;
pub mod storage;

// Re-export commonly used types
pub use backends::Backends;
pub use config::AppConfig;
pub use db::{DocumentRepository, InMemoryRepository, Repository};
pub use errors::{AppError, Result};
pub use queue::{ExtractJob, JobQueue, JobSource};
pub use signing::UrlSigner;
pub use storage::{Container, ObjectStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Media type of the derived text artifacts
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
