//! Backend wiring
//!
//! Builds the repository, object store and queue selected by configuration.
//! The in-memory queue is one channel serving both the producer and the
//! consumer side, so it only works when the worker pool is embedded.

use crate::config::{AppConfig, DatabaseBackend, QueueBackend, StorageBackend};
use crate::db::{DbPool, DocumentRepository, InMemoryRepository, Repository};
use crate::errors::Result;
use crate::queue::{JobQueue, JobSource, MemoryQueue, SqsQueue};
use crate::storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
use std::sync::Arc;
use tracing::info;

/// Shared handles to every external collaborator
#[derive(Clone)]
pub struct Backends {
    pub repository: Arc<dyn DocumentRepository>,
    pub store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub source: Arc<dyn JobSource>,
}

impl Backends {
    /// Connect to the configured backends and verify they are usable
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let repository: Arc<dyn DocumentRepository> = match config.database.backend {
            DatabaseBackend::Postgres => {
                let pool = DbPool::new(&config.database).await?;
                pool.ensure_schema().await?;
                Arc::new(Repository::new(pool))
            }
            DatabaseBackend::Memory => Arc::new(InMemoryRepository::new()),
        };

        let store: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::S3 => Arc::new(S3ObjectStore::new(&config.storage).await?),
            StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
        };
        store.ensure_containers().await?;

        let (queue, source): (Arc<dyn JobQueue>, Arc<dyn JobSource>) = match config.queue.backend {
            QueueBackend::Sqs => {
                let sqs = Arc::new(SqsQueue::new(&config.queue).await?);
                (sqs.clone(), sqs)
            }
            QueueBackend::Memory => {
                let memory = Arc::new(MemoryQueue::new(config.queue.memory_capacity));
                (memory.clone(), memory)
            }
        };

        info!(
            database = ?config.database.backend,
            storage = ?config.storage.backend,
            queue = ?config.queue.backend,
            "Backends ready"
        );

        Ok(Self {
            repository,
            store,
            queue,
            source,
        })
    }

    /// Every backend in memory, sharing one queue
    pub fn in_memory(queue_capacity: usize) -> Self {
        let queue = Arc::new(MemoryQueue::new(queue_capacity));
        Self {
            repository: Arc::new(InMemoryRepository::new()),
            store: Arc::new(MemoryObjectStore::new()),
            queue: queue.clone(),
            source: queue,
        }
    }
}
