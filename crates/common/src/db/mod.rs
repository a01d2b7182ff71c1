//! Database layer for VaultDrop
//!
//! Provides:
//! - SeaORM entity model for documents
//! - Repository pattern for document status transitions
//! - Connection pool management and schema bootstrap
//! - An in-memory repository for single-process deployments and tests

mod memory;
pub mod models;
mod repository;

pub use memory::InMemoryRepository;
pub use repository::{DocumentRepository, Repository, COMPLETED_FROM, FAILED_FROM, PROCESSING_FROM};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY,
    file_name TEXT NOT NULL,
    object_key TEXT NOT NULL,
    processed_key TEXT,
    status TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)"#;

const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)";

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection; status reads and writes both go here
    pub primary: Arc<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to metadata database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self::from_connection(primary))
    }

    /// Wrap an already open connection
    pub fn from_connection(primary: DatabaseConnection) -> Self {
        Self {
            primary: Arc::new(primary),
        }
    }

    /// Get the connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Create the documents table if needed
    pub async fn ensure_schema(&self) -> Result<()> {
        self.primary.execute_unprepared(CREATE_DOCUMENTS_TABLE).await?;
        self.primary.execute_unprepared(CREATE_STATUS_INDEX).await?;
        info!("Documents schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        Ok(())
    }
}
