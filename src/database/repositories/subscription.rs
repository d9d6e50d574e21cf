//! Subscription repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::models::billing::{CreateSubscriptionRequest, Subscription, SubscriptionStatus};
use crate::utils::errors::VisaPilotError;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, amount, currency, status, stripe_session_id, paid_at, expires_at, trial_started_at, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a subscription row. Trial rows are stamped with `trial_started_at`.
    pub async fn create(&self, request: CreateSubscriptionRequest) -> Result<Subscription, VisaPilotError> {
        let now = Utc::now();
        let trial_started_at = (request.status == SubscriptionStatus::Trial).then_some(now);

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (user_id, plan, amount, currency, status, expires_at, trial_started_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(&request.plan)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(request.status)
        .bind(request.expires_at)
        .bind(trial_started_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, VisaPilotError> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Most recently created subscription of a user
    pub async fn latest_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, VisaPilotError> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, VisaPilotError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Whether a trial was ever granted, including trial rows later reused by a checkout
    pub async fn has_had_trial(&self, user_id: Uuid) -> Result<bool, VisaPilotError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND (trial_started_at IS NOT NULL OR status = 'trial'))"
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Turn an existing row into a pending checkout for another plan
    pub async fn reuse_for_checkout(&self, id: Uuid, plan: &str, amount: i64, currency: &str) -> Result<Subscription, VisaPilotError> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET plan = $2, amount = $3, currency = $4, status = 'pending', stripe_session_id = NULL, updated_at = $5
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(plan)
        .bind(amount)
        .bind(currency)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("Subscription", id))?;

        Ok(subscription)
    }

    /// Remember the checkout session opened for a subscription
    pub async fn set_session(&self, id: Uuid, session_id: &str) -> Result<(), VisaPilotError> {
        sqlx::query("UPDATE subscriptions SET stripe_session_id = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(session_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Activate a subscription outside of the webhook
    pub async fn activate(&self, id: Uuid, paid_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<Subscription, VisaPilotError> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = 'active', paid_at = $2, expires_at = $3, updated_at = $2
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(paid_at)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("Subscription", id))?;

        Ok(subscription)
    }
}
