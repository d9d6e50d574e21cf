//! Database service layer
//!
//! This module provides a high-level interface to database operations

use serde::Serialize;
use uuid::Uuid;
use crate::database::{
    DatabasePool, UserRepository, CaseRepository, ChecklistRepository, DocumentRepository,
    InvoiceRepository, SubscriptionRepository, MessageRepository, WebhookRepository,
};
use crate::models::*;
use crate::utils::errors::VisaPilotError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub users: UserRepository,
    pub cases: CaseRepository,
    pub checklist: ChecklistRepository,
    pub documents: DocumentRepository,
    pub invoices: InvoiceRepository,
    pub subscriptions: SubscriptionRepository,
    pub messages: MessageRepository,
    pub webhooks: WebhookRepository,
}

/// A case with everything its detail view shows
#[derive(Debug, Clone, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub case: Case,
    pub checklist: Vec<CaseChecklistItem>,
    pub documents: Vec<Document>,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            cases: CaseRepository::new(pool.clone()),
            checklist: ChecklistRepository::new(pool.clone()),
            documents: DocumentRepository::new(pool.clone()),
            invoices: InvoiceRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            webhooks: WebhookRepository::new(pool.clone()),
            pool,
        }
    }

    /// Underlying pool, for notification listeners
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Make sure a profile row exists for an identity; idempotent
    pub async fn ensure_profile(&self, request: CreateUserRequest) -> Result<User, VisaPilotError> {
        if let Some(existing_user) = self.users.find_by_id(request.id).await? {
            return Ok(existing_user);
        }

        let id = request.id;
        if let Some(user) = self.users.create_if_absent(request).await? {
            tracing::info!(user_id = %user.id, "Profile created");
            return Ok(user);
        }

        // Lost a race with a concurrent completion of the same signup
        self.users.find_by_id(id).await?
            .ok_or_else(|| VisaPilotError::not_found("User", id))
    }

    /// Load a case together with its checklist and documents
    pub async fn case_detail(&self, case: Case) -> Result<CaseDetail, VisaPilotError> {
        let checklist = self.checklist.items_for_case(case.id).await?;
        let documents = self.documents.list_for_case(case.id).await?;

        Ok(CaseDetail { case, checklist, documents })
    }

    /// Load a case by id with its checklist and documents
    pub async fn case_detail_by_id(&self, case_id: Uuid) -> Result<CaseDetail, VisaPilotError> {
        let case = self.cases.find_by_id(case_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Case", case_id))?;

        self.case_detail(case).await
    }
}
