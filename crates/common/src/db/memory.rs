//! In-memory document repository
//!
//! Same transition rules as the Postgres repository, with the row map
//! guarded by a single lock. Used for all-in-one deployments and tests.

use super::models::{Document, DocumentStatus};
use super::repository::{DocumentRepository, COMPLETED_FROM, FAILED_FROM, PROCESSING_FROM};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryRepository {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Copy of every stored document, in no particular order
    pub async fn snapshot(&self) -> Vec<Document> {
        self.documents.read().await.values().cloned().collect()
    }

    async fn transition<F>(&self, id: Uuid, allowed: &[DocumentStatus], apply: F) -> Result<Document>
    where
        F: FnOnce(&mut Document),
    {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&id)
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

        let current = doc.document_status();
        if !allowed.contains(&current) {
            return Err(AppError::StatusConflict {
                id: id.to_string(),
                current,
            });
        }

        apply(doc);
        doc.updated_at = chrono::Utc::now().into();
        Ok(doc.clone())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn create(&self, document: Document) -> Result<Document> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(AppError::DuplicateDocument {
                id: document.id.to_string(),
            });
        }

        let mut document = document;
        document.status = DocumentStatus::Queued;
        document.processed_key = None;
        document.content.clear();
        document.error_message = None;

        documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Document> {
        self.documents
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })
    }

    async fn mark_processing(&self, id: Uuid) -> Result<Document> {
        self.transition(id, PROCESSING_FROM, |doc| {
            doc.status = DocumentStatus::Processing;
        })
        .await
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<Document> {
        self.transition(id, FAILED_FROM, |doc| {
            doc.status = DocumentStatus::Failed;
            doc.error_message = Some(reason.to_string());
        })
        .await
    }

    async fn mark_completed(&self, id: Uuid, processed_key: &str, content: &str) -> Result<Document> {
        self.transition(id, COMPLETED_FROM, |doc| {
            doc.status = DocumentStatus::Completed;
            doc.processed_key = Some(processed_key.to_string());
            doc.content = content.to_string();
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
