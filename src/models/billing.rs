//! Billing models: case invoices, client invoices, subscriptions and the
//! processed webhook ledger

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Trial,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    /// Rows in these states are reused by the next checkout instead of adding a row
    pub fn is_reusable_for_checkout(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Expired)
    }
}

/// Case-scoped invoice
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub case_id: Uuid,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Client-scoped invoice issued by an admin as a PDF
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserInvoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub amount: i64,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub stripe_session_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProcessedWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

/// State changes carried by a completed checkout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutCompletion {
    pub subscription_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub user_invoice_id: Option<Uuid>,
    pub payment_intent_id: Option<String>,
    pub paid_at: DateTime<Utc>,
    /// Expiry given to a subscription activated by this checkout
    pub subscription_expires_at: DateTime<Utc>,
}

/// Rows touched while applying a webhook event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub duplicate: bool,
    pub subscription_activated: bool,
    pub invoices_paid: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub case_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInvoiceRequest {
    pub user_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub plan: String,
    pub amount: i64,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Which invoice table a checkout or download refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceScope {
    Case,
    Client,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reusable_statuses() {
        assert!(SubscriptionStatus::Trial.is_reusable_for_checkout());
        assert!(SubscriptionStatus::Expired.is_reusable_for_checkout());
        assert!(!SubscriptionStatus::Active.is_reusable_for_checkout());
        assert!(!SubscriptionStatus::Pending.is_reusable_for_checkout());
        assert!(!SubscriptionStatus::Cancelled.is_reusable_for_checkout());
    }
}
