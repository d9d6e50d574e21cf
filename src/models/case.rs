//! Case model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "case_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Case {
    pub id: Uuid,
    pub user_id: Uuid,
    pub case_type: String,
    pub visa_type: String,
    pub country_of_origin: Option<String>,
    pub target_visa_date: Option<NaiveDate>,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseRequest {
    pub user_id: Uuid,
    pub case_type: String,
    pub visa_type: String,
    pub country_of_origin: Option<String>,
    pub target_visa_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCaseRequest {
    pub case_type: Option<String>,
    pub visa_type: Option<String>,
    pub country_of_origin: Option<String>,
    pub target_visa_date: Option<NaiveDate>,
}
