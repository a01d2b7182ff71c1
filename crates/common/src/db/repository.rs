//! Repository pattern for document status
//!
//! The repository is the single writer of document status. Every transition
//! is a compare-and-swap on the row: the update only applies when the current
//! status is one of the expected prior states, so a late `processing` write
//! can never clobber a `completed` or `failed` row.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use uuid::Uuid;

/// States from which a worker may claim a document
pub const PROCESSING_FROM: &[DocumentStatus] = &[
    DocumentStatus::Queued,
    DocumentStatus::Processing,
    DocumentStatus::Failed,
];

/// States from which an attempt may be recorded as failed
pub const FAILED_FROM: &[DocumentStatus] = &[DocumentStatus::Queued, DocumentStatus::Processing];

/// States from which an attempt may complete
pub const COMPLETED_FROM: &[DocumentStatus] = &[DocumentStatus::Processing];

/// Document metadata store
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new row in `queued`; fails if the id already exists
    async fn create(&self, document: Document) -> Result<Document>;

    /// Current row, or `DocumentNotFound`
    async fn get(&self, id: Uuid) -> Result<Document>;

    /// Claim the document for an extraction attempt
    async fn mark_processing(&self, id: Uuid) -> Result<Document>;

    /// Record a failed attempt
    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<Document>;

    /// Record a successful attempt with its artifact
    async fn mark_completed(&self, id: Uuid, processed_key: &str, content: &str) -> Result<Document>;

    /// Connectivity check behind `/ready`
    async fn ping(&self) -> Result<()>;
}

/// Postgres-backed repository
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    fn allowed(states: &[DocumentStatus]) -> Vec<String> {
        states.iter().map(|s| s.as_str().to_string()).collect()
    }

    /// Resolve a zero-row conditional update into NotFound or StatusConflict
    async fn rejected(&self, id: Uuid) -> AppError {
        match self.get(id).await {
            Ok(current) => AppError::StatusConflict {
                id: id.to_string(),
                current: current.document_status(),
            },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl DocumentRepository for Repository {
    async fn create(&self, document: Document) -> Result<Document> {
        let id = document.id;
        let active = DocumentActiveModel {
            id: Set(document.id),
            file_name: Set(document.file_name),
            object_key: Set(document.object_key),
            processed_key: Set(None),
            status: Set(DocumentStatus::Queued),
            content: Set(String::new()),
            error_message: Set(None),
            created_at: Set(document.created_at),
            updated_at: Set(document.updated_at),
        };

        active.insert(self.conn()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateDocument {
                id: id.to_string(),
            },
            _ => AppError::Database(e),
        })
    }

    async fn get(&self, id: Uuid) -> Result<Document> {
        DocumentEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })
    }

    async fn mark_processing(&self, id: Uuid) -> Result<Document> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let updated = DocumentEntity::update_many()
            .col_expr(DocumentColumn::Status, Expr::value(DocumentStatus::Processing.as_str()))
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now))
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::Status.is_in(Self::allowed(PROCESSING_FROM)))
            .exec_with_returning(self.conn())
            .await?;

        match updated.into_iter().next() {
            Some(doc) => Ok(doc),
            None => Err(self.rejected(id).await),
        }
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<Document> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let updated = DocumentEntity::update_many()
            .col_expr(DocumentColumn::Status, Expr::value(DocumentStatus::Failed.as_str()))
            .col_expr(DocumentColumn::ErrorMessage, Expr::value(reason))
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now))
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::Status.is_in(Self::allowed(FAILED_FROM)))
            .exec_with_returning(self.conn())
            .await?;

        match updated.into_iter().next() {
            Some(doc) => Ok(doc),
            None => Err(self.rejected(id).await),
        }
    }

    async fn mark_completed(&self, id: Uuid, processed_key: &str, content: &str) -> Result<Document> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let updated = DocumentEntity::update_many()
            .col_expr(DocumentColumn::Status, Expr::value(DocumentStatus::Completed.as_str()))
            .col_expr(DocumentColumn::ProcessedKey, Expr::value(processed_key))
            .col_expr(DocumentColumn::Content, Expr::value(content))
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now))
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::Status.is_in(Self::allowed(COMPLETED_FROM)))
            .exec_with_returning(self.conn())
            .await?;

        match updated.into_iter().next() {
            Some(doc) => Ok(doc),
            None => Err(self.rejected(id).await),
        }
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
