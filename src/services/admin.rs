//! Admin workflow
//!
//! Every operation here expects an admin caller; `require_admin` is the one
//! predicate the HTTP layer and the services share.

use std::sync::Arc;
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use crate::config::settings::Settings;
use crate::database::service::CaseDetail;
use crate::database::DatabaseService;
use crate::models::billing::{
    CreateInvoiceRequest, CreateSubscriptionRequest, CreateUserInvoiceRequest, Invoice, Subscription,
    SubscriptionStatus, UserInvoice,
};
use crate::models::case::{Case, CaseStatus, CreateCaseRequest};
use crate::models::document::{CreateDocumentRequest, DocumentStatus, ReviewDocumentRequest};
use crate::models::message::{CaseMessage, CreateMessageRequest};
use crate::models::user::{User, UserRole};
use crate::models::VisaCatalogue;
use crate::services::billing::subscription_expiry;
use crate::services::documents::UploadedFile;
use crate::services::identity::IdentityService;
use crate::services::storage::{object_path, Bucket, StorageService};
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::generate_random_string;
use crate::utils::logging::log_admin_action;

/// Allow only admins through
pub fn require_admin(user: &User) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(VisaPilotError::PermissionDenied("Admin access required".to_string()))
    }
}

/// Case invoice amounts are positive minor units
pub fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(VisaPilotError::InvalidInput("Amount must be greater than zero".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminCaseView {
    #[serde(flatten)]
    pub detail: CaseDetail,
    pub owner: Option<User>,
    pub messages: Vec<CaseMessage>,
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminInvoiceList {
    pub case_invoices: Vec<Invoice>,
    pub client_invoices: Vec<UserInvoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaseInvoiceInput {
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientInvoiceInput {
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub file: UploadedFile,
}

/// What demo data generation produced
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedData {
    pub case: Case,
    pub documents: usize,
    pub invoice: Invoice,
    pub subscription: Subscription,
}

const DEMO_COUNTRIES: &[&str] = &["India", "Brazil", "Nigeria", "Philippines", "Mexico", "Vietnam"];

/// Admin workflow service
#[derive(Clone)]
#[derive(Debug)]
pub struct AdminService {
    database: DatabaseService,
    storage: StorageService,
    identity: IdentityService,
    catalogue: Arc<VisaCatalogue>,
    settings: Arc<Settings>,
}

impl AdminService {
    pub fn new(
        database: DatabaseService,
        storage: StorageService,
        identity: IdentityService,
        catalogue: Arc<VisaCatalogue>,
        settings: Arc<Settings>,
    ) -> Self {
        Self { database, storage, identity, catalogue, settings }
    }

    pub async fn list_cases(&self, admin: &User) -> Result<Vec<Case>> {
        require_admin(admin)?;
        self.database.cases.list().await
    }

    pub async fn list_users(&self, admin: &User) -> Result<Vec<User>> {
        require_admin(admin)?;
        self.database.users.list().await
    }

    pub async fn list_invoices(&self, admin: &User) -> Result<AdminInvoiceList> {
        require_admin(admin)?;
        Ok(AdminInvoiceList {
            case_invoices: self.database.invoices.list_case_invoices().await?,
            client_invoices: self.database.invoices.list_user_invoices().await?,
        })
    }

    /// One case with owner, checklist, documents, messages and invoices
    pub async fn case_overview(&self, admin: &User, case_id: Uuid) -> Result<AdminCaseView> {
        require_admin(admin)?;
        let detail = self.database.case_detail_by_id(case_id).await?;
        let owner = self.database.users.find_by_id(detail.case.user_id).await?;
        let messages = self.database.messages.list_for_case(case_id).await?;
        let invoices = self.database.invoices.case_invoices_for_case(case_id).await?;

        Ok(AdminCaseView { detail, owner, messages, invoices })
    }

    pub async fn set_case_status(&self, admin: &User, case_id: Uuid, status: CaseStatus) -> Result<Case> {
        require_admin(admin)?;
        let case = self.database.cases.set_status(case_id, status).await?;
        log_admin_action(admin.id, "case_status_changed", Some(&case_id.to_string()), Some(&format!("{:?}", status)));
        Ok(case)
    }

    pub async fn create_case_invoice(&self, admin: &User, case_id: Uuid, input: CaseInvoiceInput) -> Result<Invoice> {
        require_admin(admin)?;
        validate_amount(input.amount)?;
        if self.database.cases.find_by_id(case_id).await?.is_none() {
            return Err(VisaPilotError::not_found("Case", case_id));
        }

        let invoice = self.database.invoices.create_case_invoice(CreateInvoiceRequest {
            case_id,
            amount: input.amount,
            currency: self.currency_or_default(input.currency),
            description: input.description.filter(|d| !d.trim().is_empty()),
        }).await?;

        log_admin_action(admin.id, "case_invoice_created", Some(&case_id.to_string()), Some(&invoice.id.to_string()));
        Ok(invoice)
    }

    /// Store an invoice PDF for a client and record it; the object is removed if the row fails
    pub async fn upload_client_invoice(&self, admin: &User, input: ClientInvoiceInput) -> Result<UserInvoice> {
        require_admin(admin)?;
        validate_amount(input.amount)?;
        if self.database.users.find_by_id(input.user_id).await?.is_none() {
            return Err(VisaPilotError::not_found("User", input.user_id));
        }

        let path = object_path(&input.user_id.to_string(), &input.file.file_name);
        let content_type = input.file.content_type.clone().unwrap_or_else(|| "application/pdf".to_string());
        self.storage.upload(Bucket::Invoices, &path, &content_type, input.file.bytes).await?;

        let created = self.database.invoices.create_user_invoice(CreateUserInvoiceRequest {
            user_id: input.user_id,
            file_path: path.clone(),
            file_name: input.file.file_name,
            amount: input.amount,
            currency: self.currency_or_default(input.currency),
            description: input.description.filter(|d| !d.trim().is_empty()),
            created_by: admin.id,
        }).await;

        match created {
            Ok(invoice) => {
                log_admin_action(admin.id, "client_invoice_uploaded", Some(&input.user_id.to_string()), Some(&invoice.id.to_string()));
                Ok(invoice)
            }
            Err(e) => {
                self.storage.remove_orphan(Bucket::Invoices, &path).await;
                Err(e)
            }
        }
    }

    /// Grant access without a checkout
    pub async fn mark_paid(&self, admin: &User, user_id: Uuid) -> Result<User> {
        require_admin(admin)?;
        let user = self.database.users.set_paid_at(user_id, Utc::now()).await?;
        log_admin_action(admin.id, "user_marked_paid", Some(&user_id.to_string()), None);
        Ok(user)
    }

    /// Set a role on the profile row and mirror it to the identity provider
    pub async fn sync_user_role(&self, admin: &User, user_id: Uuid, role: UserRole) -> Result<User> {
        require_admin(admin)?;
        let user = self.database.users.set_role(user_id, role).await?;
        self.identity.admin_set_role(user_id, role).await?;

        log_admin_action(admin.id, "user_role_synced", Some(&user_id.to_string()), Some(role.as_str()));
        Ok(user)
    }

    /// Populate a demo case for a client that has none
    pub async fn generate_test_data(&self, admin: &User, user_id: Uuid) -> Result<GeneratedData> {
        require_admin(admin)?;

        let client = self.database.users.find_by_id(user_id).await?
            .ok_or_else(|| VisaPilotError::not_found("User", user_id))?;
        if client.is_admin() {
            return Err(VisaPilotError::InvalidInput("Demo data can only be generated for clients".to_string()));
        }
        if self.database.cases.count_for_user(user_id).await? > 0 {
            return Err(VisaPilotError::Conflict("Client already has a case".to_string()));
        }

        let (program_code, country) = {
            let mut rng = rand::thread_rng();
            let program = self.catalogue.programs
                .choose(&mut rng)
                .ok_or_else(|| VisaPilotError::Config("Visa program catalogue is empty".to_string()))?;
            let country = DEMO_COUNTRIES.choose(&mut rng).copied().unwrap_or("India");
            (program.code.clone(), country)
        };

        let case = self.database.cases.create_with_checklist(CreateCaseRequest {
            user_id,
            case_type: "demo".to_string(),
            visa_type: program_code,
            country_of_origin: Some(country.to_string()),
            target_visa_date: Some((Utc::now() + chrono::Duration::days(180)).date_naive()),
        }).await?
            .ok_or_else(|| VisaPilotError::Conflict("Client already has a case".to_string()))?;

        let items = self.database.checklist.items_for_case(case.id).await?;
        let mut documents = 0;
        for (index, item) in items.iter().take(3).enumerate() {
            let file_name = format!("{}.pdf", item.title.to_lowercase().replace(' ', "-"));
            let document = self.database.documents.create(CreateDocumentRequest {
                case_id: case.id,
                checklist_item_id: Some(item.id),
                title: item.title.clone(),
                description: Some("Generated sample document".to_string()),
                file_path: format!("demo/{}/{}-{}", case.id, generate_random_string(8), file_name),
                file_name,
                file_size: 1024 * (index as i64 + 1),
                mime_type: Some("application/pdf".to_string()),
                uploaded_by: user_id,
                status: DocumentStatus::Pending,
            }).await?;

            if index == 0 {
                self.database.documents.review(document.id, ReviewDocumentRequest {
                    status: DocumentStatus::Approved,
                    admin_notes: None,
                    reviewed_by: admin.id,
                }).await?;
                self.database.checklist.set_completed(item.id, true).await?;
            }
            documents += 1;
        }

        self.database.messages.create(CreateMessageRequest {
            case_id: case.id,
            sender_id: admin.id,
            content: "Welcome! We have reviewed your first document. Please upload the remaining items.".to_string(),
        }).await?;

        let plan = self.settings.payments.plans.first()
            .ok_or_else(|| VisaPilotError::Config("No checkout plans configured".to_string()))?;

        let invoice = self.database.invoices.create_case_invoice(CreateInvoiceRequest {
            case_id: case.id,
            amount: plan.amount,
            currency: self.settings.payments.currency.clone(),
            description: Some("Case preparation fee".to_string()),
        }).await?;

        // A trial row is activated in place, like a checkout would
        let pending = match self.database.subscriptions.latest_for_user(user_id).await? {
            Some(existing) => existing,
            None => self.database.subscriptions.create(CreateSubscriptionRequest {
                user_id,
                plan: plan.name.clone(),
                amount: plan.amount,
                currency: self.settings.payments.currency.clone(),
                status: SubscriptionStatus::Pending,
                expires_at: None,
            }).await?,
        };
        let paid_at = Utc::now();
        let subscription = self.database.subscriptions.activate(pending.id, paid_at, subscription_expiry(paid_at)).await?;
        self.database.users.set_paid_at(user_id, paid_at).await?;

        info!(case_id = %case.id, user_id = %user_id, documents, subscription_id = %subscription.id, "Demo data generated");
        log_admin_action(admin.id, "test_data_generated", Some(&user_id.to_string()), Some(&case.id.to_string()));
        Ok(GeneratedData { case, documents, invoice, subscription })
    }

    fn currency_or_default(&self, currency: Option<String>) -> String {
        currency
            .map(|currency| currency.trim().to_lowercase())
            .filter(|currency| currency.len() == 3)
            .unwrap_or_else(|| self.settings.payments.currency.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "staff@example.com".to_string(),
            full_name: None,
            phone: None,
            role,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&user(UserRole::Admin)).is_ok());
        assert!(matches!(require_admin(&user(UserRole::Client)), Err(VisaPilotError::PermissionDenied(_))));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1).is_ok());
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-5).is_err());
    }
}
