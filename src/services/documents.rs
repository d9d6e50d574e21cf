//! Document workflow
//!
//! Uploads go through a single path: store the object, insert the row, and
//! remove the object again if the row cannot be written.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::document::{CreateDocumentRequest, Document, DocumentStatus, ReviewDocumentRequest};
use crate::models::user::User;
use crate::services::cases::ensure_case_access;
use crate::services::storage::{object_path, Bucket, StorageService};
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::normalize_whitespace;
use crate::utils::logging::{log_admin_action, log_user_action};

/// File received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadInput {
    pub case_id: Uuid,
    pub checklist_item_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub status: DocumentStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Signed, short-lived link to a stored file
#[derive(Debug, Clone, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub file_name: String,
    pub expires_in: u64,
}

/// Title shown for a document: explicit title, else the file name
pub fn document_title(title: Option<&str>, file_name: &str) -> String {
    title
        .map(normalize_whitespace)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| normalize_whitespace(file_name))
}

/// Needs-revision and rejected reviews must explain themselves
pub fn validate_review(input: &ReviewInput) -> Result<Option<String>> {
    let notes = input.admin_notes.as_deref().map(str::trim).filter(|notes| !notes.is_empty());
    if input.status.requires_notes() && notes.is_none() {
        return Err(VisaPilotError::InvalidInput(
            "Notes are required when a document needs revision or is rejected".to_string(),
        ));
    }
    Ok(notes.map(str::to_string))
}

/// Document workflow service
#[derive(Clone)]
#[derive(Debug)]
pub struct DocumentService {
    database: DatabaseService,
    storage: StorageService,
}

impl DocumentService {
    pub fn new(database: DatabaseService, storage: StorageService) -> Self {
        Self { database, storage }
    }

    async fn authorize_case(&self, caller: &User, case_id: Uuid) -> Result<()> {
        let case = self.database.cases.find_by_id(case_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Case", case_id))?;
        ensure_case_access(caller, &case)
    }

    /// Store a file and record it against a case
    pub async fn upload(&self, caller: &User, input: UploadInput) -> Result<Document> {
        self.authorize_case(caller, input.case_id).await?;

        if input.file.file_name.trim().is_empty() {
            return Err(VisaPilotError::InvalidInput("File name is required".to_string()));
        }

        if let Some(item_id) = input.checklist_item_id {
            let item = self.database.checklist.find_item(item_id).await?
                .ok_or_else(|| VisaPilotError::not_found("Checklist item", item_id))?;
            if item.case_id != input.case_id {
                return Err(VisaPilotError::InvalidInput(
                    "Checklist item belongs to a different case".to_string(),
                ));
            }
        }

        let title = document_title(input.title.as_deref(), &input.file.file_name);
        let content_type = input.file.content_type.clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_size = input.file.bytes.len() as i64;
        let path = object_path(&input.case_id.to_string(), &input.file.file_name);

        self.storage.upload(Bucket::Documents, &path, &content_type, input.file.bytes).await?;

        let request = CreateDocumentRequest {
            case_id: input.case_id,
            checklist_item_id: input.checklist_item_id,
            title,
            description: input.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            file_path: path.clone(),
            file_name: input.file.file_name,
            file_size,
            mime_type: input.file.content_type,
            uploaded_by: caller.id,
            status: DocumentStatus::Pending,
        };

        let document = match self.database.documents.create(request).await {
            Ok(document) => document,
            Err(e) => {
                self.storage.remove_orphan(Bucket::Documents, &path).await;
                return Err(e);
            }
        };

        info!(document_id = %document.id, case_id = %document.case_id, size = file_size, "Document uploaded");
        log_user_action(caller.id, "document_uploaded", Some(&document.title));
        Ok(document)
    }

    /// Documents of a case, newest first
    pub async fn list(&self, caller: &User, case_id: Uuid) -> Result<Vec<Document>> {
        self.authorize_case(caller, case_id).await?;
        self.database.documents.list_for_case(case_id).await
    }

    /// Record an admin's review decision
    pub async fn review(&self, reviewer: &User, document_id: Uuid, input: ReviewInput) -> Result<Document> {
        crate::services::admin::require_admin(reviewer)?;
        let admin_notes = validate_review(&input)?;

        let document = self.database.documents.review(document_id, ReviewDocumentRequest {
            status: input.status,
            admin_notes,
            reviewed_by: reviewer.id,
        }).await?;

        log_admin_action(reviewer.id, "document_reviewed", Some(&document_id.to_string()), Some(&format!("{:?}", document.status)));
        Ok(document)
    }

    /// Signed download link for the owner or an admin
    pub async fn download_link(&self, caller: &User, document_id: Uuid) -> Result<DownloadLink> {
        let document = self.database.documents.find_by_id(document_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Document", document_id))?;
        self.authorize_case(caller, document.case_id).await?;

        let url = self.storage.signed_url(Bucket::Documents, &document.file_path).await?;
        Ok(DownloadLink {
            url,
            file_name: document.file_name,
            expires_in: self.storage.signed_url_ttl_seconds(),
        })
    }
}
