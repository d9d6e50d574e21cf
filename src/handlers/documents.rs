//! Document handlers

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use crate::handlers::multipart::UploadForm;
use crate::middleware::{AdminContext, AuthContext};
use crate::models::document::Document;
use crate::services::documents::{DownloadLink, ReviewInput, UploadInput};
use crate::state::AppState;
use crate::utils::errors::Result;

#[derive(Debug, Deserialize)]
pub struct CaseQuery {
    pub case_id: Uuid,
}

pub async fn handle_list_documents(
    State(state): State<AppState>,
    context: AuthContext,
    Query(query): Query<CaseQuery>,
) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.services.document_service.list(&context.user, query.case_id).await?))
}

/// Served on both upload paths
pub async fn handle_upload_document(
    State(state): State<AppState>,
    context: AuthContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>)> {
    let mut form = UploadForm::read(multipart).await?;

    let input = UploadInput {
        case_id: form.required_uuid("case_id")?,
        checklist_item_id: form.uuid("checklist_item_id")?,
        title: form.text("title"),
        description: form.text("description"),
        file: form.take_file()?,
    };

    let document = state.services.document_service.upload(&context.user, input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn handle_review_document(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(document_id): Path<Uuid>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<Document>> {
    Ok(Json(state.services.document_service.review(admin.user(), document_id, input).await?))
}

pub async fn handle_download_document(
    State(state): State<AppState>,
    context: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DownloadLink>> {
    Ok(Json(state.services.document_service.download_link(&context.user, document_id).await?))
}
