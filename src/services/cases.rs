//! Case workflow
//!
//! One case per client, its checklist and its message thread.

use std::sync::Arc;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use crate::database::service::{CaseDetail, DatabaseService};
use crate::models::case::{Case, CreateCaseRequest, UpdateCaseRequest};
use crate::models::checklist::CaseChecklistItem;
use crate::models::message::{CaseMessage, CreateMessageRequest};
use crate::models::user::User;
use crate::models::VisaCatalogue;
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::required_field;
use crate::utils::logging::log_user_action;

pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Owner or admin may act on a case
pub fn ensure_case_access(caller: &User, case: &Case) -> Result<()> {
    if caller.is_admin() || case.user_id == caller.id {
        Ok(())
    } else {
        Err(VisaPilotError::PermissionDenied("You do not have access to this case".to_string()))
    }
}

/// Whether an edit replaces the checklist
pub fn needs_regeneration(current_visa_type: &str, requested_visa_type: Option<&str>, regenerate: bool) -> bool {
    regenerate && requested_visa_type.is_some_and(|requested| requested != current_visa_type)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCaseInput {
    pub case_type: String,
    pub visa_type: String,
    #[serde(default)]
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub target_visa_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditCaseInput {
    pub case_type: Option<String>,
    pub visa_type: Option<String>,
    pub country_of_origin: Option<String>,
    pub target_visa_date: Option<NaiveDate>,
    #[serde(default)]
    pub regenerate_checklist: bool,
}

/// A client's case as the dashboard shows it
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    #[serde(flatten)]
    pub detail: CaseDetail,
    pub program_name: Option<String>,
    pub personalization: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedCase {
    #[serde(flatten)]
    pub view: CaseView,
    pub created: bool,
}

/// Case workflow service
#[derive(Clone)]
#[derive(Debug)]
pub struct CaseService {
    database: DatabaseService,
    catalogue: Arc<VisaCatalogue>,
}

impl CaseService {
    pub fn new(database: DatabaseService, catalogue: Arc<VisaCatalogue>) -> Self {
        Self { database, catalogue }
    }

    fn view(&self, detail: CaseDetail) -> CaseView {
        let program = self.catalogue.get(&detail.case.visa_type);
        CaseView {
            program_name: program.map(|program| program.name.clone()),
            personalization: program.map(|program| program.personalization.clone()),
            detail,
        }
    }

    /// Load a case the caller may see
    pub async fn authorize_case(&self, caller: &User, case_id: Uuid) -> Result<Case> {
        let case = self.database.cases.find_by_id(case_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Case", case_id))?;
        ensure_case_access(caller, &case)?;
        Ok(case)
    }

    /// Get-or-create the caller's case; `created` tells which happened
    pub async fn create_case(&self, caller: &User, input: NewCaseInput) -> Result<CreatedCase> {
        if caller.is_admin() {
            return Err(VisaPilotError::PermissionDenied("Administrators cannot open cases".to_string()));
        }

        let case_type = required_field(&input.case_type, "Case type")?;
        let visa_type = required_field(&input.visa_type, "Visa type")?;
        self.catalogue.require(&visa_type)?;

        if let Some(existing) = self.database.cases.find_latest_for_user(caller.id).await? {
            debug!(user_id = %caller.id, case_id = %existing.id, "Case already exists");
            let detail = self.database.case_detail(existing).await?;
            return Ok(CreatedCase { view: self.view(detail), created: false });
        }

        let request = CreateCaseRequest {
            user_id: caller.id,
            case_type,
            visa_type,
            country_of_origin: optional_text(input.country_of_origin),
            target_visa_date: input.target_visa_date,
        };

        let (case, created) = match self.database.cases.create_with_checklist(request).await? {
            Some(case) => (case, true),
            // Lost the race against a concurrent create
            None => {
                let case = self.database.cases.find_latest_for_user(caller.id).await?
                    .ok_or_else(|| VisaPilotError::not_found("Case", caller.id))?;
                (case, false)
            }
        };

        if created {
            info!(user_id = %caller.id, case_id = %case.id, visa_type = %case.visa_type, "Case created");
            log_user_action(caller.id, "case_created", Some(&case.visa_type));
        }

        let detail = self.database.case_detail(case).await?;
        Ok(CreatedCase { view: self.view(detail), created })
    }

    /// The caller's own case
    pub async fn my_case(&self, caller: &User) -> Result<CaseView> {
        let case = self.database.cases.find_latest_for_user(caller.id).await?
            .ok_or_else(|| VisaPilotError::not_found("Case", caller.id))?;

        let detail = self.database.case_detail(case).await?;
        Ok(self.view(detail))
    }

    /// Edit case fields. Changing the visa type with `regenerate_checklist`
    /// discards the checklist, including completion state.
    pub async fn edit_case(&self, caller: &User, case_id: Uuid, input: EditCaseInput) -> Result<CaseView> {
        let case = self.database.cases.find_by_id(case_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Case", case_id))?;
        if case.user_id != caller.id {
            return Err(VisaPilotError::PermissionDenied("Only the case owner can edit it".to_string()));
        }

        let visa_type = optional_text(input.visa_type);
        if let Some(visa_type) = &visa_type {
            self.catalogue.require(visa_type)?;
        }

        let regenerate = needs_regeneration(&case.visa_type, visa_type.as_deref(), input.regenerate_checklist);
        let request = UpdateCaseRequest {
            case_type: optional_text(input.case_type),
            visa_type,
            country_of_origin: optional_text(input.country_of_origin),
            target_visa_date: input.target_visa_date,
        };

        let updated = self.database.cases.update(case_id, request, regenerate).await?;
        if regenerate {
            info!(case_id = %case_id, from = %case.visa_type, to = %updated.visa_type, "Checklist regenerated for new visa type");
        }
        log_user_action(caller.id, "case_updated", Some(&case_id.to_string()));

        let detail = self.database.case_detail(updated).await?;
        Ok(self.view(detail))
    }

    /// Mark a checklist item done or not done.
    ///
    /// Completing needs a satisfying document; the item is left untouched otherwise.
    pub async fn toggle_item(&self, caller: &User, item_id: Uuid, completed: bool) -> Result<CaseChecklistItem> {
        let item = self.database.checklist.find_item(item_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Checklist item", item_id))?;
        self.authorize_case(caller, item.case_id).await?;

        if completed && !item.completed {
            let documents = self.database.documents.list_for_case(item.case_id).await?;
            if !item.is_satisfied_by_any(&documents) {
                return Err(VisaPilotError::Conflict(format!(
                    "Please upload a document for \"{}\" before marking it complete",
                    item.title
                )));
            }
        }

        let item = self.database.checklist.set_completed(item_id, completed).await?;
        log_user_action(caller.id, if completed { "checklist_completed" } else { "checklist_reopened" }, Some(&item.title));
        Ok(item)
    }

    /// Thread of a case, oldest first
    pub async fn list_messages(&self, caller: &User, case_id: Uuid) -> Result<Vec<CaseMessage>> {
        self.authorize_case(caller, case_id).await?;
        self.database.messages.list_for_case(case_id).await
    }

    /// Post to a case thread as the caller
    pub async fn post_message(&self, caller: &User, case_id: Uuid, content: &str) -> Result<CaseMessage> {
        self.authorize_case(caller, case_id).await?;

        let content = required_field(content, "Message")?;
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(VisaPilotError::InvalidInput(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        self.database.messages.create(CreateMessageRequest {
            case_id,
            sender_id: caller.id,
            content,
        }).await
    }
}
