//! Document query and download handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use vaultdrop_common::{
    config::UrlMode,
    db::models::{Document, DocumentStatus},
    errors::{AppError, Result},
    signing,
    storage::Container,
    TEXT_CONTENT_TYPE,
};

/// Document metadata as returned by `GET /documents/{id}`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub file_name: String,
    pub object_key: String,
    pub processed_key: Option<String>,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub content: String,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            status: doc.document_status(),
            id: doc.id,
            file_name: doc.file_name,
            object_key: doc.object_key,
            processed_key: doc.processed_key,
            content: doc.content,
            error_message: doc.error_message,
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
        }
    }
}

/// Signed link to the processed artifact
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedUrlResponse {
    pub url: String,
    /// Unix timestamp after which the link stops working
    pub expires: i64,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub expires: Option<String>,
    pub signature: Option<String>,
}

/// Unparseable ids cannot exist, so they are reported as not found
async fn load(state: &AppState, id: &str) -> Result<Document> {
    let uuid = Uuid::parse_str(id).map_err(|_| AppError::DocumentNotFound { id: id.to_string() })?;
    state.repository.get(uuid).await
}

/// Get document metadata
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>> {
    let doc = load(&state, &id).await?;
    Ok(Json(doc.into()))
}

/// Get the extracted text, or 202 while extraction has not finished
pub async fn get_text(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let doc = load(&state, &id).await?;

    if !doc.has_content() {
        return Ok((StatusCode::ACCEPTED, "document not processed").into_response());
    }

    Ok(([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], doc.content).into_response())
}

/// Mint a time-limited link to the processed artifact
pub async fn processed_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessedUrlResponse>> {
    let doc = load(&state, &id).await?;
    let key = artifact_key(&doc)?;

    let now = chrono::Utc::now().timestamp();
    let ttl = state.signer.ttl();

    let (url, expires) = match state.config.signing.url_mode {
        UrlMode::Store => {
            let url = state.store.presign(Container::Processed, key, ttl).await?;
            (url, signing::expiry_after(now, ttl))
        }
        UrlMode::Gateway => {
            let id = doc.id.to_string();
            let (expires, signature) = state.signer.issue(&id, now)?;
            let base = state.config.signing.public_base_url.trim_end_matches('/');
            let url = format!("{base}/documents/{id}/download?expires={expires}&signature={signature}");
            (url, expires)
        }
    };

    tracing::debug!(document_id = %doc.id, expires, "Issued processed artifact URL");
    Ok(Json(ProcessedUrlResponse { url, expires }))
}

/// Serve the processed artifact behind a gateway-signed link
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Result<Response> {
    let expires = params.expires.ok_or_else(|| AppError::MissingField {
        field: "expires".into(),
    })?;
    let signature = params.signature.ok_or_else(|| AppError::MissingField {
        field: "signature".into(),
    })?;

    // Verify before touching the repository so unsigned callers learn nothing
    state
        .signer
        .check(&id, &expires, &signature, chrono::Utc::now().timestamp())?;

    let doc = load(&state, &id).await?;
    let key = artifact_key(&doc)?;
    let body = state.store.get(Container::Processed, key).await?;

    let disposition = format!("attachment; filename=\"{}\"", download_name(key));
    Ok((
        [
            (header::CONTENT_TYPE, TEXT_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

fn artifact_key(doc: &Document) -> Result<&str> {
    match (&doc.processed_key, doc.document_status()) {
        (Some(key), DocumentStatus::Completed) => Ok(key),
        _ => Err(AppError::ArtifactUnavailable {
            id: doc.id.to_string(),
        }),
    }
}

fn download_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_uses_camel_case() {
        let doc = Document::new_queued(Uuid::new_v4(), "a.pdf".into(), "uploads/x/a.pdf".into());
        let json = serde_json::to_value(DocumentResponse::from(doc)).unwrap();

        assert_eq!(json["status"], "queued");
        assert_eq!(json["fileName"], "a.pdf");
        assert_eq!(json["objectKey"], "uploads/x/a.pdf");
        assert!(json["processedKey"].is_null());
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_artifact_requires_completion() {
        let mut doc = Document::new_queued(Uuid::new_v4(), "a.pdf".into(), "uploads/x/a.pdf".into());
        assert!(matches!(artifact_key(&doc), Err(AppError::ArtifactUnavailable { .. })));

        doc.processed_key = Some("uploads/x/a.txt".into());
        doc.status = DocumentStatus::Completed;
        assert_eq!(artifact_key(&doc).unwrap(), "uploads/x/a.txt");
    }

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("uploads/x/a.txt"), "a.txt");
        assert_eq!(download_name("a.txt"), "a.txt");
    }
}
