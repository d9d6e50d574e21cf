//! Billing workflow
//!
//! Trials, plan checkout, invoice checkout, webhook application and invoice
//! downloads.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use crate::config::settings::{PlanConfig, Settings};
use crate::database::DatabaseService;
use crate::models::billing::{
    CheckoutCompletion, CreateSubscriptionRequest, Invoice, InvoiceScope, PaymentStatus,
    Subscription, SubscriptionStatus, UserInvoice, WebhookOutcome,
};
use crate::models::user::User;
use crate::services::documents::DownloadLink;
use crate::services::payments::{CheckoutSessionRequest, PaymentsService};
use crate::services::storage::{Bucket, StorageService};
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::logging::{log_payment_event, log_user_action};

pub const TRIAL_PLAN: &str = "trial";

/// Catalogue plan for a checkout; a price sent by the browser must match it
pub fn select_plan<'a>(plans: &'a [PlanConfig], name: &str, price: Option<i64>) -> Result<&'a PlanConfig> {
    let plan = plans
        .iter()
        .find(|plan| plan.name == name)
        .ok_or_else(|| VisaPilotError::InvalidInput(format!("Unknown plan: {}", name)))?;

    match price {
        Some(price) if price != plan.amount => Err(VisaPilotError::InvalidInput(
            "Price does not match the selected plan".to_string(),
        )),
        _ => Ok(plan),
    }
}

/// How the next checkout is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutRow {
    Reuse(Uuid),
    Insert,
}

/// Trial and expired rows are turned into the new checkout; anything else gets a new row
pub fn checkout_row(latest: Option<&Subscription>) -> CheckoutRow {
    match latest {
        Some(subscription) if subscription.status.is_reusable_for_checkout() => CheckoutRow::Reuse(subscription.id),
        _ => CheckoutRow::Insert,
    }
}

/// Paid subscriptions run for one calendar year
pub fn subscription_expiry(paid_at: DateTime<Utc>) -> DateTime<Utc> {
    paid_at
        .checked_add_months(Months::new(12))
        .unwrap_or(paid_at + Duration::days(365))
}

pub fn trial_expiry(started_at: DateTime<Utc>, trial_days: i64) -> DateTime<Utc> {
    started_at + Duration::days(trial_days)
}

/// Invoices are visible to their owner and to admins
pub fn can_access_invoice(caller: &User, owner_id: Uuid) -> bool {
    caller.id == owner_id || caller.is_admin()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub plan: String,
    #[serde(default)]
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceCheckoutInput {
    pub invoice_id: Uuid,
    #[serde(default = "default_scope")]
    pub scope: InvoiceScope,
}

fn default_scope() -> InvoiceScope {
    InvoiceScope::Client
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvoiceCheckoutResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceList {
    pub case_invoices: Vec<Invoice>,
    pub client_invoices: Vec<UserInvoice>,
}

/// Billing workflow service
#[derive(Clone)]
#[derive(Debug)]
pub struct BillingService {
    database: DatabaseService,
    payments: PaymentsService,
    storage: StorageService,
    settings: Arc<Settings>,
}

impl BillingService {
    pub fn new(database: DatabaseService, payments: PaymentsService, storage: StorageService, settings: Arc<Settings>) -> Self {
        Self { database, payments, storage, settings }
    }

    fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.server.public_base_url.trim_end_matches('/'), path)
    }

    /// Grant the one free trial a user is entitled to
    pub async fn start_trial(&self, caller: &User) -> Result<Subscription> {
        if self.database.subscriptions.has_had_trial(caller.id).await? {
            return Err(VisaPilotError::Conflict("You have already used your free trial".to_string()));
        }

        let subscription = self.database.subscriptions.create(CreateSubscriptionRequest {
            user_id: caller.id,
            plan: TRIAL_PLAN.to_string(),
            amount: 0,
            currency: self.payments.currency().to_string(),
            status: SubscriptionStatus::Trial,
            expires_at: Some(trial_expiry(Utc::now(), self.settings.payments.trial_days)),
        }).await?;

        log_user_action(caller.id, "trial_started", Some(&subscription.id.to_string()));
        Ok(subscription)
    }

    /// Open a hosted checkout for a catalogue plan
    pub async fn create_checkout(&self, caller: &User, input: CheckoutInput) -> Result<CheckoutResponse> {
        let plan = select_plan(&self.settings.payments.plans, input.plan.trim(), input.price)?;
        let currency = self.payments.currency();

        let latest = self.database.subscriptions.latest_for_user(caller.id).await?;
        let subscription = match checkout_row(latest.as_ref()) {
            CheckoutRow::Reuse(id) => {
                debug!(subscription_id = %id, "Reusing subscription row for checkout");
                self.database.subscriptions.reuse_for_checkout(id, &plan.name, plan.amount, currency).await?
            }
            CheckoutRow::Insert => {
                self.database.subscriptions.create(CreateSubscriptionRequest {
                    user_id: caller.id,
                    plan: plan.name.clone(),
                    amount: plan.amount,
                    currency: currency.to_string(),
                    status: SubscriptionStatus::Pending,
                    expires_at: None,
                }).await?
            }
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("subscription_id".to_string(), subscription.id.to_string());
        metadata.insert("user_id".to_string(), caller.id.to_string());

        let session = self.payments.create_checkout_session(&CheckoutSessionRequest {
            product_name: plan.display_name.clone(),
            amount: plan.amount,
            currency: currency.to_string(),
            customer_email: Some(caller.email.clone()),
            client_reference_id: caller.id.to_string(),
            success_url: self.page_url("/payment-success?session_id={CHECKOUT_SESSION_ID}"),
            cancel_url: self.page_url("/pricing"),
            metadata,
        }).await?;

        self.database.subscriptions.set_session(subscription.id, &session.id).await?;
        log_user_action(caller.id, "checkout_started", Some(&plan.name));

        let url = session.url
            .ok_or_else(|| VisaPilotError::ServiceUnavailable("Payment provider returned no checkout URL".to_string()))?;
        Ok(CheckoutResponse { url, session_id: session.id, subscription_id: subscription.id })
    }

    /// Open a hosted checkout for one of the caller's pending invoices
    pub async fn invoice_checkout(&self, caller: &User, input: InvoiceCheckoutInput) -> Result<InvoiceCheckoutResponse> {
        let (owner_id, amount, currency, status, description, metadata_key) = match input.scope {
            InvoiceScope::Case => {
                let invoice = self.database.invoices.find_case_invoice(input.invoice_id).await?
                    .ok_or_else(|| VisaPilotError::not_found("Invoice", input.invoice_id))?;
                let case = self.database.cases.find_by_id(invoice.case_id).await?
                    .ok_or_else(|| VisaPilotError::not_found("Case", invoice.case_id))?;
                (case.user_id, invoice.amount, invoice.currency, invoice.status, invoice.description, "invoice_id")
            }
            InvoiceScope::Client => {
                let invoice = self.database.invoices.find_user_invoice(input.invoice_id).await?
                    .ok_or_else(|| VisaPilotError::not_found("Invoice", input.invoice_id))?;
                (invoice.user_id, invoice.amount, invoice.currency, invoice.status, invoice.description, "user_invoice_id")
            }
        };

        if owner_id != caller.id {
            return Err(VisaPilotError::PermissionDenied("You can only pay your own invoices".to_string()));
        }
        if status != PaymentStatus::Pending {
            return Err(VisaPilotError::Conflict("Invoice is already paid".to_string()));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_key.to_string(), input.invoice_id.to_string());
        metadata.insert("user_id".to_string(), caller.id.to_string());

        let session = self.payments.create_checkout_session(&CheckoutSessionRequest {
            product_name: description.unwrap_or_else(|| "Invoice".to_string()),
            amount,
            currency,
            customer_email: Some(caller.email.clone()),
            client_reference_id: caller.id.to_string(),
            success_url: self.page_url("/payment-success?session_id={CHECKOUT_SESSION_ID}"),
            cancel_url: self.page_url("/dashboard/invoices"),
            metadata,
        }).await?;

        match input.scope {
            InvoiceScope::Case => self.database.invoices.set_case_invoice_session(input.invoice_id, &session.id).await?,
            InvoiceScope::Client => self.database.invoices.set_user_invoice_session(input.invoice_id, &session.id).await?,
        }

        let url = session.url
            .ok_or_else(|| VisaPilotError::ServiceUnavailable("Payment provider returned no checkout URL".to_string()))?;
        Ok(InvoiceCheckoutResponse { url, session_id: session.id })
    }

    /// Verify and apply a webhook delivery; replays are acknowledged without writes
    pub async fn handle_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookOutcome> {
        let event = self.payments.verify_event(payload, signature_header)?;

        let completion = event.is_checkout_completed().then(|| {
            let references = event.checkout_references();
            let paid_at = Utc::now();
            CheckoutCompletion {
                subscription_id: references.subscription_id,
                invoice_id: references.invoice_id,
                user_invoice_id: references.user_invoice_id,
                payment_intent_id: references.payment_intent_id,
                paid_at,
                subscription_expires_at: subscription_expiry(paid_at),
            }
        });

        let outcome = self.database.webhooks.apply_event(&event.id, &event.event_type, completion.as_ref()).await?;

        let target = completion.as_ref().and_then(|completion| {
            completion.subscription_id
                .or(completion.invoice_id)
                .or(completion.user_invoice_id)
                .map(|id| id.to_string())
        });
        log_payment_event(&event.id, &event.event_type, target.as_deref(), outcome.duplicate);

        if outcome.subscription_activated {
            info!(event_id = %event.id, "Subscription activated");
        }

        Ok(outcome)
    }

    /// The caller's case and client invoices
    pub async fn list_invoices(&self, caller: &User) -> Result<InvoiceList> {
        Ok(InvoiceList {
            case_invoices: self.database.invoices.case_invoices_for_user(caller.id).await?,
            client_invoices: self.database.invoices.user_invoices_for_user(caller.id).await?,
        })
    }

    /// Signed link to an invoice PDF for its owner or an admin
    pub async fn invoice_download(&self, caller: &User, invoice_id: Uuid) -> Result<DownloadLink> {
        let invoice = self.database.invoices.find_user_invoice(invoice_id).await?
            .ok_or_else(|| VisaPilotError::not_found("Invoice", invoice_id))?;

        if !can_access_invoice(caller, invoice.user_id) {
            return Err(VisaPilotError::PermissionDenied("You do not have access to this invoice".to_string()));
        }

        let url = self.storage.signed_url(Bucket::Invoices, &invoice.file_path).await?;
        Ok(DownloadLink {
            url,
            file_name: invoice.file_name,
            expires_in: self.storage.signed_url_ttl_seconds(),
        })
    }
}
