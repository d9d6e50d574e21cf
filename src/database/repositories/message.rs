//! Case message repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::message::{CaseMessage, CreateMessageRequest};
use crate::utils::errors::VisaPilotError;

#[derive(Clone)]
#[derive(Debug)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a message to a case thread
    pub async fn create(&self, request: CreateMessageRequest) -> Result<CaseMessage, VisaPilotError> {
        let message = sqlx::query_as::<_, CaseMessage>(
            r#"
            INSERT INTO case_messages (case_id, sender_id, content, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, case_id, sender_id, content, created_at
            "#
        )
        .bind(request.case_id)
        .bind(request.sender_id)
        .bind(&request.content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    /// Thread of a case in chronological order
    pub async fn list_for_case(&self, case_id: Uuid) -> Result<Vec<CaseMessage>, VisaPilotError> {
        let messages = sqlx::query_as::<_, CaseMessage>(
            "SELECT id, case_id, sender_id, content, created_at FROM case_messages WHERE case_id = $1 ORDER BY created_at ASC"
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
