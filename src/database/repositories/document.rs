//! Document repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::document::{CreateDocumentRequest, Document, ReviewDocumentRequest};
use crate::utils::errors::VisaPilotError;

const DOCUMENT_COLUMNS: &str = "id, case_id, checklist_item_id, title, description, file_path, file_name, file_size, mime_type, uploaded_by, status, admin_notes, reviewed_by, reviewed_at, uploaded_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new document row
    pub async fn create(&self, request: CreateDocumentRequest) -> Result<Document, VisaPilotError> {
        let document = sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (case_id, checklist_item_id, title, description, file_path, file_name, file_size, mime_type, uploaded_by, status, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(request.case_id)
        .bind(request.checklist_item_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.file_path)
        .bind(&request.file_name)
        .bind(request.file_size)
        .bind(&request.mime_type)
        .bind(request.uploaded_by)
        .bind(request.status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(document)
    }

    /// Find document by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, VisaPilotError> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    /// Documents of a case, newest first
    pub async fn list_for_case(&self, case_id: Uuid) -> Result<Vec<Document>, VisaPilotError> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE case_id = $1 ORDER BY uploaded_at DESC"
        ))
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    /// Apply a review decision in a single statement
    pub async fn review(&self, id: Uuid, request: ReviewDocumentRequest) -> Result<Document, VisaPilotError> {
        let document = sqlx::query_as::<_, Document>(&format!(
            r#"
            UPDATE documents
            SET status = $2, admin_notes = $3, reviewed_by = $4, reviewed_at = $5
            WHERE id = $1
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.status)
        .bind(&request.admin_notes)
        .bind(request.reviewed_by)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("Document", id))?;

        Ok(document)
    }
}
