//! Services module
//!
//! Workflow services with the business rules, and thin delegates for the
//! hosted identity, storage, payments, LLM and e-mail providers.

pub mod identity;
pub mod storage;
pub mod payments;
pub mod assistant;
pub mod email;
pub mod auth;
pub mod user;
pub mod cases;
pub mod documents;
pub mod billing;
pub mod admin;

// Re-export commonly used services
pub use identity::{IdentityService, IdentityUser, Session};
pub use storage::{StorageService, Bucket};
pub use payments::{PaymentsService, WebhookEvent};
pub use assistant::AssistantService;
pub use email::{EmailService, ContactRequest};
pub use auth::{AuthService, Portal};
pub use user::UserService;
pub use cases::CaseService;
pub use documents::DocumentService;
pub use billing::BillingService;
pub use admin::AdminService;

use std::sync::Arc;
use serde::Deserialize;
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::VisaCatalogue;
use crate::utils::errors::{VisaPilotError, Result};

/// Error body shapes used by the hosted providers
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<serde_json::Value>,
}

impl ProviderErrorBody {
    fn message(self) -> Option<String> {
        let nested = self.error.and_then(|error| match error {
            serde_json::Value::String(message) => Some(message),
            serde_json::Value::Object(fields) => fields
                .get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string),
            _ => None,
        });

        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(nested)
            .filter(|message| !message.trim().is_empty())
    }
}

/// Turn a non-success provider response into an error carrying its message verbatim
pub(crate) async fn provider_error(service: &'static str, response: reqwest::Response) -> VisaPilotError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ProviderErrorBody>(&text)
        .ok()
        .and_then(ProviderErrorBody::message)
        .unwrap_or_else(|| format!("{} request failed with status {}", service, status));

    crate::utils::logging::log_api_error(service, &message, Some(&format!("status {}", status)));
    VisaPilotError::Provider { service, status, message }
}

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub settings: Arc<Settings>,
    pub database: DatabaseService,
    pub catalogue: Arc<VisaCatalogue>,
    pub identity: IdentityService,
    pub assistant: AssistantService,
    pub email: EmailService,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub case_service: CaseService,
    pub document_service: DocumentService,
    pub billing_service: BillingService,
    pub admin_service: AdminService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(settings: Settings, database: DatabaseService) -> Result<Self> {
        let settings = Arc::new(settings);
        let catalogue = Arc::new(VisaCatalogue::load()?);

        let identity = IdentityService::new(settings.identity.clone())?;
        let storage = StorageService::new(settings.storage.clone())?;
        let payments = PaymentsService::new(settings.payments.clone())?;
        let assistant = AssistantService::new(settings.assistant.clone(), &catalogue)?;
        let email = EmailService::new(settings.email.clone())?;

        let user_service = UserService::new(database.clone(), identity.clone());
        let auth_service = AuthService::new(identity.clone(), user_service.clone(), settings.server.public_base_url.clone());
        let case_service = CaseService::new(database.clone(), catalogue.clone());
        let document_service = DocumentService::new(database.clone(), storage.clone());
        let billing_service = BillingService::new(database.clone(), payments, storage.clone(), settings.clone());
        let admin_service = AdminService::new(database.clone(), storage, identity.clone(), catalogue.clone(), settings.clone());

        Ok(Self {
            settings,
            database,
            catalogue,
            identity,
            assistant,
            email,
            auth_service,
            user_service,
            case_service,
            document_service,
            billing_service,
            admin_service,
        })
    }

    /// Health check for the services with a backing dependency
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let database_healthy = crate::database::health_check(self.database.pool()).await.is_ok();

        ServiceHealthStatus {
            database_healthy,
            assistant_configured: self.assistant.provider().is_some(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub assistant_configured: bool,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.database_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.assistant_configured {
            issues.push("No assistant provider configured".to_string());
        }

        issues
    }
}
