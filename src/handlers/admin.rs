//! Admin handlers
//!
//! Every route takes `AdminContext`, so a non-admin never reaches a service call.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use crate::handlers::multipart::UploadForm;
use crate::middleware::AdminContext;
use crate::models::billing::{Invoice, UserInvoice};
use crate::models::case::{Case, CaseStatus};
use crate::models::user::{User, UserRole};
use crate::services::admin::{AdminCaseView, AdminInvoiceList, CaseInvoiceInput, ClientInvoiceInput, GeneratedData};
use crate::state::AppState;
use crate::utils::errors::{VisaPilotError, Result};

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: CaseStatus,
}

#[derive(Debug, Deserialize)]
pub struct UserBody {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub user_id: Uuid,
    pub role: UserRole,
}

pub async fn handle_list_cases(State(state): State<AppState>, admin: AdminContext) -> Result<Json<Vec<Case>>> {
    Ok(Json(state.services.admin_service.list_cases(admin.user()).await?))
}

pub async fn handle_list_users(State(state): State<AppState>, admin: AdminContext) -> Result<Json<Vec<User>>> {
    Ok(Json(state.services.admin_service.list_users(admin.user()).await?))
}

pub async fn handle_list_invoices(State(state): State<AppState>, admin: AdminContext) -> Result<Json<AdminInvoiceList>> {
    Ok(Json(state.services.admin_service.list_invoices(admin.user()).await?))
}

pub async fn handle_case_overview(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(case_id): Path<Uuid>,
) -> Result<Json<AdminCaseView>> {
    Ok(Json(state.services.admin_service.case_overview(admin.user(), case_id).await?))
}

pub async fn handle_set_case_status(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(case_id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Case>> {
    Ok(Json(state.services.admin_service.set_case_status(admin.user(), case_id, body.status).await?))
}

pub async fn handle_create_case_invoice(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(case_id): Path<Uuid>,
    Json(input): Json<CaseInvoiceInput>,
) -> Result<(StatusCode, Json<Invoice>)> {
    let invoice = state.services.admin_service.create_case_invoice(admin.user(), case_id, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Multipart: `user_id`, `amount` (minor units), optional `currency` and `description`, and `file`
pub async fn handle_upload_client_invoice(
    State(state): State<AppState>,
    admin: AdminContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UserInvoice>)> {
    let mut form = UploadForm::read(multipart).await?;

    let input = ClientInvoiceInput {
        user_id: form.required_uuid("user_id")?,
        amount: form.parse::<i64>("amount")?
            .ok_or_else(|| VisaPilotError::InvalidInput("amount is required".to_string()))?,
        currency: form.text("currency"),
        description: form.text("description"),
        file: form.take_file()?,
    };

    let invoice = state.services.admin_service.upload_client_invoice(admin.user(), input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn handle_mark_paid(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(body): Json<UserBody>,
) -> Result<Json<User>> {
    Ok(Json(state.services.admin_service.mark_paid(admin.user(), body.user_id).await?))
}

pub async fn handle_sync_user_role(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(body): Json<RoleBody>,
) -> Result<Json<User>> {
    Ok(Json(state.services.admin_service.sync_user_role(admin.user(), body.user_id, body.role).await?))
}

pub async fn handle_generate_test_data(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(body): Json<UserBody>,
) -> Result<(StatusCode, Json<GeneratedData>)> {
    let generated = state.services.admin_service.generate_test_data(admin.user(), body.user_id).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}
