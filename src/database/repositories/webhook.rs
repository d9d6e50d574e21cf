//! Webhook ledger
//!
//! Applies payment events together with the dedup record, so an event id is
//! either fully applied once or not at all.

use sqlx::PgPool;
use uuid::Uuid;
use crate::models::billing::{CheckoutCompletion, WebhookOutcome};
use crate::utils::errors::VisaPilotError;

#[derive(Clone)]
#[derive(Debug)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an event id and apply its checkout completion, if any.
    ///
    /// A replayed event id writes nothing and reports `duplicate`.
    pub async fn apply_event(
        &self,
        event_id: &str,
        event_type: &str,
        completion: Option<&CheckoutCompletion>,
    ) -> Result<WebhookOutcome, VisaPilotError> {
        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, event_type, processed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&mut *tx)
        .await?;

        if recorded.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(WebhookOutcome { duplicate: true, ..WebhookOutcome::default() });
        }

        let mut outcome = WebhookOutcome::default();

        if let Some(completion) = completion {
            if let Some(subscription_id) = completion.subscription_id {
                let owner: Option<(Uuid,)> = sqlx::query_as(
                    r#"
                    UPDATE subscriptions
                    SET status = 'active', paid_at = $2, expires_at = $3, updated_at = $2
                    WHERE id = $1
                    RETURNING user_id
                    "#
                )
                .bind(subscription_id)
                .bind(completion.paid_at)
                .bind(completion.subscription_expires_at)
                .fetch_optional(&mut *tx)
                .await?;

                if let Some((user_id,)) = owner {
                    sqlx::query("UPDATE users SET paid_at = $2, updated_at = $2 WHERE id = $1 AND paid_at IS NULL")
                        .bind(user_id)
                        .bind(completion.paid_at)
                        .execute(&mut *tx)
                        .await?;
                    outcome.subscription_activated = true;
                } else {
                    tracing::warn!(event_id, subscription_id = %subscription_id, "Checkout referenced an unknown subscription");
                }
            }

            if let Some(invoice_id) = completion.invoice_id {
                let result = sqlx::query(
                    r#"
                    UPDATE invoices
                    SET status = 'paid', paid_at = $2, stripe_payment_intent_id = COALESCE($3, stripe_payment_intent_id)
                    WHERE id = $1
                    "#
                )
                .bind(invoice_id)
                .bind(completion.paid_at)
                .bind(&completion.payment_intent_id)
                .execute(&mut *tx)
                .await?;
                outcome.invoices_paid += result.rows_affected();
            }

            if let Some(user_invoice_id) = completion.user_invoice_id {
                let result = sqlx::query(
                    r#"
                    UPDATE user_invoices
                    SET status = 'paid', paid_at = $2, stripe_payment_intent_id = COALESCE($3, stripe_payment_intent_id)
                    WHERE id = $1
                    "#
                )
                .bind(user_invoice_id)
                .bind(completion.paid_at)
                .bind(&completion.payment_intent_id)
                .execute(&mut *tx)
                .await?;
                outcome.invoices_paid += result.rows_affected();
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}
