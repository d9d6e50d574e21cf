//! Case repository implementation
//!
//! Case creation and visa type changes touch the checklist in the same
//! transaction, so those statements live here rather than in the checklist
//! repository.

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use uuid::Uuid;
use crate::models::case::{Case, CaseStatus, CreateCaseRequest, UpdateCaseRequest};
use crate::utils::errors::VisaPilotError;

#[derive(Clone)]
#[derive(Debug)]
pub struct CaseRepository {
    pool: PgPool,
}

/// Copy the templates of a visa type into a case, keeping template order
async fn copy_templates(conn: &mut PgConnection, case_id: Uuid, visa_type: &str) -> Result<u64, VisaPilotError> {
    let result = sqlx::query(
        r#"
        INSERT INTO case_checklist (case_id, template_id, title, description, required, order_index, completed)
        SELECT $1, id, title, description, required, order_index, FALSE
        FROM checklist_templates
        WHERE visa_type = $2
        ORDER BY order_index ASC
        "#
    )
    .bind(case_id)
    .bind(visa_type)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

impl CaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a case and its checklist.
    ///
    /// Returns `None` when the user already holds a case; nothing is written then.
    pub async fn create_with_checklist(&self, request: CreateCaseRequest) -> Result<Option<Case>, VisaPilotError> {
        let mut tx = self.pool.begin().await?;

        let case = sqlx::query_as::<_, Case>(
            r#"
            INSERT INTO cases (user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $6)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING id, user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at
            "#
        )
        .bind(request.user_id)
        .bind(&request.case_type)
        .bind(&request.visa_type)
        .bind(&request.country_of_origin)
        .bind(request.target_visa_date)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(case) = case else {
            tx.rollback().await?;
            return Ok(None);
        };

        let copied = copy_templates(&mut tx, case.id, &case.visa_type).await?;
        tx.commit().await?;

        tracing::debug!(case_id = %case.id, items = copied, "Checklist created from templates");
        Ok(Some(case))
    }

    /// Update case fields; with `regenerate_checklist` the checklist is
    /// replaced by the templates of the (new) visa type in the same transaction.
    pub async fn update(&self, id: Uuid, request: UpdateCaseRequest, regenerate_checklist: bool) -> Result<Case, VisaPilotError> {
        let mut tx = self.pool.begin().await?;

        let case = sqlx::query_as::<_, Case>(
            r#"
            UPDATE cases
            SET case_type = COALESCE($2, case_type),
                visa_type = COALESCE($3, visa_type),
                country_of_origin = COALESCE($4, country_of_origin),
                target_visa_date = COALESCE($5, target_visa_date),
                updated_at = $6
            WHERE id = $1
            RETURNING id, user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.case_type)
        .bind(request.visa_type)
        .bind(request.country_of_origin)
        .bind(request.target_visa_date)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("Case", id))?;

        if regenerate_checklist {
            sqlx::query("DELETE FROM case_checklist WHERE case_id = $1")
                .bind(case.id)
                .execute(&mut *tx)
                .await?;
            let copied = copy_templates(&mut tx, case.id, &case.visa_type).await?;
            tracing::debug!(case_id = %case.id, items = copied, "Checklist regenerated");
        }

        tx.commit().await?;
        Ok(case)
    }

    /// Find case by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Case>, VisaPilotError> {
        let case = sqlx::query_as::<_, Case>(
            "SELECT id, user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at FROM cases WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(case)
    }

    /// Most recent case of a user
    pub async fn find_latest_for_user(&self, user_id: Uuid) -> Result<Option<Case>, VisaPilotError> {
        let case = sqlx::query_as::<_, Case>(
            "SELECT id, user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at FROM cases WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(case)
    }

    /// Count cases of a user
    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, VisaPilotError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cases WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Set case status
    pub async fn set_status(&self, id: Uuid, status: CaseStatus) -> Result<Case, VisaPilotError> {
        let case = sqlx::query_as::<_, Case>(
            r#"
            UPDATE cases
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("Case", id))?;

        Ok(case)
    }

    /// List all cases, newest first
    pub async fn list(&self) -> Result<Vec<Case>, VisaPilotError> {
        let cases = sqlx::query_as::<_, Case>(
            "SELECT id, user_id, case_type, visa_type, country_of_origin, target_visa_date, status, created_at, updated_at FROM cases ORDER BY created_at DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(cases)
    }
}
