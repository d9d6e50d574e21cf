//! Checklist repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::checklist::{CaseChecklistItem, ChecklistTemplate};
use crate::utils::errors::VisaPilotError;

#[derive(Clone)]
#[derive(Debug)]
pub struct ChecklistRepository {
    pool: PgPool,
}

impl ChecklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Templates of a visa type in display order
    pub async fn templates_for(&self, visa_type: &str) -> Result<Vec<ChecklistTemplate>, VisaPilotError> {
        let templates = sqlx::query_as::<_, ChecklistTemplate>(
            "SELECT id, visa_type, title, description, required, order_index FROM checklist_templates WHERE visa_type = $1 ORDER BY order_index ASC"
        )
        .bind(visa_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(templates)
    }

    /// Checklist of a case in display order
    pub async fn items_for_case(&self, case_id: Uuid) -> Result<Vec<CaseChecklistItem>, VisaPilotError> {
        let items = sqlx::query_as::<_, CaseChecklistItem>(
            r#"
            SELECT id, case_id, template_id, title, description, required, order_index, completed, completed_at
            FROM case_checklist
            WHERE case_id = $1
            ORDER BY order_index ASC
            "#
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Find checklist item by ID
    pub async fn find_item(&self, id: Uuid) -> Result<Option<CaseChecklistItem>, VisaPilotError> {
        let item = sqlx::query_as::<_, CaseChecklistItem>(
            "SELECT id, case_id, template_id, title, description, required, order_index, completed, completed_at FROM case_checklist WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Set completion state; completed_at follows the flag
    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<CaseChecklistItem, VisaPilotError> {
        let completed_at = if completed { Some(Utc::now()) } else { None };

        let item = sqlx::query_as::<_, CaseChecklistItem>(
            r#"
            UPDATE case_checklist
            SET completed = $2, completed_at = $3
            WHERE id = $1
            RETURNING id, case_id, template_id, title, description, required, order_index, completed, completed_at
            "#
        )
        .bind(id)
        .bind(completed)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("Checklist item", id))?;

        Ok(item)
    }
}
