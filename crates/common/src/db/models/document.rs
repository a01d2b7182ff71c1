//! Document entity: one uploaded file and its processing record

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document lifecycle status, stored as text.
///
/// A row holding any other value fails to load instead of being coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Queued => "queued",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Client-supplied name, sanitized
    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    /// Raw upload location; immutable
    #[sea_orm(column_type = "Text")]
    pub object_key: String,

    /// Derived artifact location; set only on completion
    #[sea_orm(column_type = "Text", nullable)]
    pub processed_key: Option<String>,

    pub status: DocumentStatus,

    /// Extracted text; empty until completed
    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Fresh row in `queued`
    pub fn new_queued(id: Uuid, file_name: String, object_key: String) -> Self {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        Self {
            id,
            file_name,
            object_key,
            processed_key: None,
            status: DocumentStatus::Queued,
            content: String::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn document_status(&self) -> DocumentStatus {
        self.status
    }

    /// Check if the document is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.document_status().is_terminal()
    }

    /// Extracted text is available
    pub fn has_content(&self) -> bool {
        self.document_status() == DocumentStatus::Completed && !self.content.is_empty()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveEnum, Iterable};

    #[test]
    fn test_stored_value_matches_display() {
        for status in DocumentStatus::iter() {
            assert_eq!(status.to_value(), status.as_str());
            assert_eq!(DocumentStatus::try_from_value(&status.to_value()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_stored_status_is_an_error() {
        for raw in ["archived", "", "Queued"] {
            assert!(DocumentStatus::try_from_value(&raw.to_string()).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_new_document_is_queued() {
        let doc = Model::new_queued(Uuid::new_v4(), "a.pdf".into(), "uploads/x/a.pdf".into());
        assert_eq!(doc.document_status(), DocumentStatus::Queued);
        assert!(!doc.is_terminal());
        assert!(!doc.has_content());
        assert_eq!(doc.created_at, doc.updated_at);
    }
}
