//! Upload handler
//!
//! `POST /documents` with a multipart `file` part. The part is spooled to a
//! temp file under the size ceiling, sniffed and scanned, then persisted in
//! order: raw object, document row, extraction job. A failure after the raw
//! object is written leaves an orphan object; there is no reconciliation.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::intake::{
    sniff,
    spool::{spool, SpooledUpload},
};
use crate::AppState;
use vaultdrop_common::{
    config::OverflowPolicy,
    db::models::Document,
    errors::{AppError, Result},
    metrics::{self, UploadOutcome},
    queue::ExtractJob,
    storage::{self, Container},
};

/// Multipart part carrying the upload
pub const FILE_FIELD: &str = "file";

/// Response after accepting an upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub status: String,
}

/// Accept a document upload and queue it for extraction
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let multipart = multipart.map_err(|_| AppError::InvalidFormat {
        message: "expecting multipart form".into(),
    })?;

    let mut received = 0;
    let result = accept(&state, multipart, &mut received).await;

    match &result {
        Ok(_) => metrics::record_upload(UploadOutcome::Accepted, received),
        Err(e) if e.is_client_error() => metrics::record_upload(UploadOutcome::Rejected, received),
        Err(_) => metrics::record_upload(UploadOutcome::Failed, received),
    }

    let id = result?;
    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            id,
            status: "queued".into(),
        }),
    ))
}

async fn accept(state: &AppState, mut multipart: Multipart, received: &mut u64) -> Result<Uuid> {
    let limits = &state.config.upload;

    let (file_name, upload) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limits.max_file_bytes))?
            .ok_or_else(|| AppError::MissingField {
                field: FILE_FIELD.into(),
            })?;

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = state.sanitizer.sanitize(field.file_name());
        let limit = limits.max_file_bytes;
        let chunks = field.map_err(move |e| multipart_error(e, limit));
        let upload = spool(chunks, limit, limits.temp_dir.as_deref()).await?;
        break (file_name, upload);
    };
    *received = upload.size;

    let content_type = check(state, &upload)?;

    let id = Uuid::new_v4();
    let object_key = storage::raw_key(&id, &file_name);

    state
        .store
        .put_file(Container::Raw, &object_key, &upload.path, &content_type)
        .await?;
    // Raw bytes are durable; the spool file can go
    drop(upload);

    state
        .repository
        .create(Document::new_queued(id, file_name.clone(), object_key.clone()))
        .await?;

    let job = ExtractJob {
        document_id: id,
        object_key,
        file_name,
    };
    if let Err(e) = state.queue.enqueue(&job).await {
        on_enqueue_failure(state, id, &e).await;
        return Err(e);
    }

    info!(document_id = %id, bytes = *received, content_type = %content_type, "Upload accepted");
    Ok(id)
}

/// Sniffed type and malware placeholder; returns the type to store with
fn check(state: &AppState, upload: &SpooledUpload) -> Result<String> {
    let limits = &state.config.upload;

    let detected = sniff::sniff(&upload.head);
    if !sniff::is_allowed(&detected, &limits.allowed_types) {
        return Err(AppError::UnsupportedMediaType {
            detected: sniff::essence(&detected).to_string(),
        });
    }

    if limits.scan_enabled && upload.flagged {
        return Err(AppError::RejectedContent {
            reason: "malware signature detected".into(),
        });
    }

    Ok(sniff::essence(&detected).to_string())
}

async fn on_enqueue_failure(state: &AppState, id: Uuid, err: &AppError) {
    if !matches!(err, AppError::QueueFull) || state.config.queue.overflow != OverflowPolicy::MarkFailed {
        warn!(document_id = %id, error = %err, "Enqueue failed, document left queued");
        return;
    }

    match state.repository.mark_failed(id, "processing queue full").await {
        Ok(_) => warn!(document_id = %id, "Queue full, document marked failed"),
        Err(e) => warn!(document_id = %id, error = %e, "Queue full and document could not be marked failed"),
    }
}

/// Body-limit hits surface as 413 from the multipart parser; keep them 400
fn multipart_error(err: MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::InvalidFormat {
            message: format!("malformed multipart body: {}", err.body_text()),
        }
    }
}
