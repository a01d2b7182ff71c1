//! Extraction worker error types

use thiserror::Error;
use uuid::Uuid;
use vaultdrop_common::errors::AppError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("PDF parse error: {0}")]
    InvalidDocument(String),

    #[error("No text content extracted from PDF")]
    EmptyText,

    #[error("Document {0} has no metadata row")]
    DocumentMissing(Uuid),

    #[error("Failed to download raw object: {0}")]
    Download(AppError),

    #[error("Failed to store processed artifact: {0}")]
    Upload(AppError),

    #[error("Failed to update document status: {0}")]
    Repository(AppError),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl WorkerError {
    /// Redelivering the job cannot change the outcome
    pub fn is_permanent(&self) -> bool {
        matches!(self, WorkerError::DocumentMissing(_))
    }
}
