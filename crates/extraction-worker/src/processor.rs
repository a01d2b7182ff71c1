//! Extraction job processor
//!
//! Handles one `ExtractJob`: claim the document, download the raw PDF,
//! extract its text, store the text artifact and record completion. Every
//! step overwrites by key or writes an absolute status, so running the
//! handler again for the same job converges on the same result.

use crate::errors::WorkerError;
use crate::pdf::TextExtractor;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use vaultdrop_common::db::models::DocumentStatus;
use vaultdrop_common::errors::AppError;
use vaultdrop_common::metrics;
use vaultdrop_common::storage::{self, Container, ObjectStore};
use vaultdrop_common::{DocumentRepository, ExtractJob, TEXT_CONTENT_TYPE};

/// What a successful handler run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Completed,
    /// An earlier delivery already completed the document
    AlreadyCompleted,
}

/// Registered with the worker runtime to process deliveries
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ExtractJob) -> Result<HandleOutcome, WorkerError>;
}

/// Extraction worker processor
pub struct ExtractionProcessor {
    repository: Arc<dyn DocumentRepository>,
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
}

impl ExtractionProcessor {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            repository,
            store,
            extractor,
        }
    }

    /// Steps after the claim; any error here marks the document failed
    async fn extract_and_store(&self, job: &ExtractJob) -> Result<(), WorkerError> {
        let raw = self
            .store
            .get(Container::Raw, &job.object_key)
            .await
            .map_err(WorkerError::Download)?;

        let started = Instant::now();
        let extractor = self.extractor.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&raw))
            .await
            .map_err(|e| WorkerError::Task(e.to_string()))?;
        metrics::record_extraction(started.elapsed().as_secs_f64(), extracted.is_ok());
        let text = extracted?;

        let processed_key = storage::processed_key(&job.object_key);
        self.store
            .put_bytes(
                Container::Processed,
                &processed_key,
                Bytes::from(text.clone()),
                TEXT_CONTENT_TYPE,
            )
            .await
            .map_err(WorkerError::Upload)?;

        match self
            .repository
            .mark_completed(job.document_id, &processed_key, &text)
            .await
        {
            Ok(_) => {}
            Err(AppError::StatusConflict {
                current: DocumentStatus::Completed,
                ..
            }) => {
                debug!("Concurrent delivery completed the document first");
            }
            Err(e) => return Err(WorkerError::Repository(e)),
        }

        info!(
            processed_key = %processed_key,
            chars = text.chars().count(),
            "Document processed"
        );
        Ok(())
    }

    async fn record_failure(&self, job: &ExtractJob, error: &WorkerError) {
        match self
            .repository
            .mark_failed(job.document_id, &error.to_string())
            .await
        {
            Ok(_) => {}
            Err(AppError::StatusConflict { current, .. }) => {
                debug!(%current, "Failure not recorded, document already moved on");
            }
            Err(e) => {
                warn!(error = %e, "Failed to mark document failed");
            }
        }
    }
}

#[async_trait]
impl JobHandler for ExtractionProcessor {
    #[instrument(skip(self, job), fields(document_id = %job.document_id))]
    async fn handle(&self, job: &ExtractJob) -> Result<HandleOutcome, WorkerError> {
        info!(object_key = %job.object_key, file_name = %job.file_name, "Processing extraction job");

        match self.repository.mark_processing(job.document_id).await {
            Ok(_) => {}
            Err(AppError::StatusConflict {
                current: DocumentStatus::Completed,
                ..
            }) => {
                info!("Document already completed, skipping");
                return Ok(HandleOutcome::AlreadyCompleted);
            }
            Err(AppError::DocumentNotFound { .. }) => {
                return Err(WorkerError::DocumentMissing(job.document_id));
            }
            Err(e) => return Err(WorkerError::Repository(e)),
        }

        match self.extract_and_store(job).await {
            Ok(()) => Ok(HandleOutcome::Completed),
            Err(e) => {
                self.record_failure(job, &e).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::pdf_with_text;
    use crate::pdf::LopdfExtractor;
    use uuid::Uuid;
    use vaultdrop_common::db::models::Document;
    use vaultdrop_common::storage::MemoryObjectStore;
    use vaultdrop_common::InMemoryRepository;

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        store: Arc<MemoryObjectStore>,
        processor: ExtractionProcessor,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let store = Arc::new(MemoryObjectStore::new());
        let processor =
            ExtractionProcessor::new(repo.clone(), store.clone(), Arc::new(LopdfExtractor));
        Fixture {
            repo,
            store,
            processor,
        }
    }

    async fn seed(f: &Fixture, pdf: Vec<u8>) -> ExtractJob {
        let id = Uuid::new_v4();
        let key = storage::raw_key(&id, "report.pdf");
        f.store
            .put_bytes(Container::Raw, &key, Bytes::from(pdf), "application/pdf")
            .await
            .unwrap();
        f.repo
            .create(Document::new_queued(id, "report.pdf".into(), key.clone()))
            .await
            .unwrap();
        ExtractJob {
            document_id: id,
            object_key: key,
            file_name: "report.pdf".into(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes_document() {
        let f = fixture();
        let job = seed(&f, pdf_with_text("Quarterly numbers")).await;

        let outcome = f.processor.handle(&job).await.unwrap();
        assert_eq!(outcome, HandleOutcome::Completed);

        let doc = f.repo.get(job.document_id).await.unwrap();
        assert_eq!(doc.document_status(), DocumentStatus::Completed);
        assert!(doc.content.contains("Quarterly numbers"));
        let processed_key = doc.processed_key.clone().unwrap();
        assert_eq!(processed_key, storage::processed_key(&job.object_key));
        assert!(processed_key.ends_with("/report.txt"));

        let artifact = f.store.get(Container::Processed, &processed_key).await.unwrap();
        assert_eq!(&artifact[..], doc.content.as_bytes());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let f = fixture();
        let job = seed(&f, pdf_with_text("Same every time")).await;

        f.processor.handle(&job).await.unwrap();
        let first = f.repo.get(job.document_id).await.unwrap();
        let key = first.processed_key.clone().unwrap();
        let first_artifact = f.store.get(Container::Processed, &key).await.unwrap();

        let outcome = f.processor.handle(&job).await.unwrap();
        assert_eq!(outcome, HandleOutcome::AlreadyCompleted);

        let second = f.repo.get(job.document_id).await.unwrap();
        assert_eq!(second.document_status(), DocumentStatus::Completed);
        assert_eq!(second.content, first.content);
        assert_eq!(second.processed_key, first.processed_key);
        assert_eq!(f.store.get(Container::Processed, &key).await.unwrap(), first_artifact);
        assert_eq!(f.store.count(Container::Processed).await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_marks_failed() {
        let f = fixture();
        let job = seed(&f, b"not a valid pdf content".to_vec()).await;

        let err = f.processor.handle(&job).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidDocument(_)));

        let doc = f.repo.get(job.document_id).await.unwrap();
        assert_eq!(doc.document_status(), DocumentStatus::Failed);
        assert!(doc.error_message.unwrap().contains("PDF parse error"));
        assert!(doc.processed_key.is_none());
        assert_eq!(f.store.count(Container::Processed).await, 0);
    }

    #[tokio::test]
    async fn test_missing_raw_object_marks_failed() {
        let f = fixture();
        let id = Uuid::new_v4();
        let key = storage::raw_key(&id, "gone.pdf");
        f.repo
            .create(Document::new_queued(id, "gone.pdf".into(), key.clone()))
            .await
            .unwrap();
        let job = ExtractJob {
            document_id: id,
            object_key: key,
            file_name: "gone.pdf".into(),
        };

        let err = f.processor.handle(&job).await.unwrap_err();
        assert!(matches!(err, WorkerError::Download(AppError::ObjectNotFound { .. })));
        assert!(!err.is_permanent());
        let doc = f.repo.get(id).await.unwrap();
        assert_eq!(doc.document_status(), DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_retry_after_failure_can_complete() {
        let f = fixture();
        let job = seed(&f, b"not a pdf".to_vec()).await;
        assert!(f.processor.handle(&job).await.is_err());

        // Operator replaces the raw object, queue redelivers
        f.store
            .put_bytes(
                Container::Raw,
                &job.object_key,
                Bytes::from(pdf_with_text("Fixed upload")),
                "application/pdf",
            )
            .await
            .unwrap();
        assert_eq!(f.processor.handle(&job).await.unwrap(), HandleOutcome::Completed);

        let doc = f.repo.get(job.document_id).await.unwrap();
        assert_eq!(doc.document_status(), DocumentStatus::Completed);
        assert!(doc.error_message.is_some());
    }

    #[tokio::test]
    async fn test_unknown_document_is_permanent() {
        let f = fixture();
        let job = ExtractJob {
            document_id: Uuid::new_v4(),
            object_key: "uploads/x/a.pdf".into(),
            file_name: "a.pdf".into(),
        };
        let err = f.processor.handle(&job).await.unwrap_err();
        assert!(err.is_permanent());
    }
}
