//! Invoice repository implementation
//!
//! Covers both case invoices and the PDF invoices admins issue to clients.

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::billing::{CreateInvoiceRequest, CreateUserInvoiceRequest, Invoice, UserInvoice};
use crate::utils::errors::VisaPilotError;

const INVOICE_COLUMNS: &str = "id, case_id, amount, currency, description, status, stripe_session_id, stripe_payment_intent_id, paid_at, created_at";
const USER_INVOICE_COLUMNS: &str = "id, user_id, file_path, file_name, amount, currency, description, status, stripe_session_id, stripe_payment_intent_id, paid_at, created_by, created_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending case invoice
    pub async fn create_case_invoice(&self, request: CreateInvoiceRequest) -> Result<Invoice, VisaPilotError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (case_id, amount, currency, description, status, created_at)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(request.case_id)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(&request.description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Create a pending client invoice backed by a stored PDF
    pub async fn create_user_invoice(&self, request: CreateUserInvoiceRequest) -> Result<UserInvoice, VisaPilotError> {
        let invoice = sqlx::query_as::<_, UserInvoice>(&format!(
            r#"
            INSERT INTO user_invoices (user_id, file_path, file_name, amount, currency, description, status, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8)
            RETURNING {USER_INVOICE_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(&request.file_path)
        .bind(&request.file_name)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(&request.description)
        .bind(request.created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(invoice)
    }

    pub async fn find_case_invoice(&self, id: Uuid) -> Result<Option<Invoice>, VisaPilotError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    pub async fn find_user_invoice(&self, id: Uuid) -> Result<Option<UserInvoice>, VisaPilotError> {
        let invoice = sqlx::query_as::<_, UserInvoice>(&format!(
            "SELECT {USER_INVOICE_COLUMNS} FROM user_invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Case invoices belonging to a user's cases, newest first
    pub async fn case_invoices_for_user(&self, user_id: Uuid) -> Result<Vec<Invoice>, VisaPilotError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.id, i.case_id, i.amount, i.currency, i.description, i.status, i.stripe_session_id,
                   i.stripe_payment_intent_id, i.paid_at, i.created_at
            FROM invoices i
            JOIN cases c ON c.id = i.case_id
            WHERE c.user_id = $1
            ORDER BY i.created_at DESC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn case_invoices_for_case(&self, case_id: Uuid) -> Result<Vec<Invoice>, VisaPilotError> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE case_id = $1 ORDER BY created_at DESC"
        ))
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Client invoices of a user, newest first
    pub async fn user_invoices_for_user(&self, user_id: Uuid) -> Result<Vec<UserInvoice>, VisaPilotError> {
        let invoices = sqlx::query_as::<_, UserInvoice>(&format!(
            "SELECT {USER_INVOICE_COLUMNS} FROM user_invoices WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn list_case_invoices(&self) -> Result<Vec<Invoice>, VisaPilotError> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn list_user_invoices(&self) -> Result<Vec<UserInvoice>, VisaPilotError> {
        let invoices = sqlx::query_as::<_, UserInvoice>(&format!(
            "SELECT {USER_INVOICE_COLUMNS} FROM user_invoices ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Remember the checkout session opened for a case invoice
    pub async fn set_case_invoice_session(&self, id: Uuid, session_id: &str) -> Result<(), VisaPilotError> {
        sqlx::query("UPDATE invoices SET stripe_session_id = $2 WHERE id = $1")
            .bind(id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remember the checkout session opened for a client invoice
    pub async fn set_user_invoice_session(&self, id: Uuid, session_id: &str) -> Result<(), VisaPilotError> {
        sqlx::query("UPDATE user_invoices SET stripe_session_id = $2 WHERE id = $1")
            .bind(id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
