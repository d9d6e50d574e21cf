//! Document model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "document_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    NeedsRevision,
    Rejected,
}

impl DocumentStatus {
    /// Review outcomes that must carry an explanation for the client
    pub fn requires_notes(&self) -> bool {
        matches!(self, DocumentStatus::NeedsRevision | DocumentStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub case_id: Uuid,
    pub checklist_item_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub uploaded_by: Uuid,
    pub status: DocumentStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub case_id: Uuid,
    pub checklist_item_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub uploaded_by: Uuid,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDocumentRequest {
    pub status: DocumentStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&DocumentStatus::NeedsRevision).unwrap(), "\"needs_revision\"");
        let parsed: DocumentStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(parsed, DocumentStatus::Approved);
        assert!(serde_json::from_str::<DocumentStatus>("\"aproved\"").is_err());
    }

    #[test]
    fn test_notes_requirement() {
        assert!(DocumentStatus::NeedsRevision.requires_notes());
        assert!(DocumentStatus::Rejected.requires_notes());
        assert!(!DocumentStatus::Approved.requires_notes());
        assert!(!DocumentStatus::Pending.requires_notes());
    }
}
