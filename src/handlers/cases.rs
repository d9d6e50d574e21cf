//! Case, checklist and message handlers

use std::convert::Infallible;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::middleware::AuthContext;
use crate::models::checklist::CaseChecklistItem;
use crate::models::message::CaseMessage;
use crate::services::cases::{CreatedCase, EditCaseInput, NewCaseInput, CaseView};
use crate::state::AppState;
use crate::utils::errors::Result;

/// Notification channels fed by the case triggers; payload is the case id
pub const CASE_CHANNELS: [&str; 2] = ["case_messages", "case_documents"];

#[derive(Debug, Deserialize)]
pub struct ToggleBody {
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub content: String,
}

/// Clients get their own case; admins get every case
pub async fn handle_get_cases(State(state): State<AppState>, context: AuthContext) -> Result<Response> {
    if context.user.is_admin() {
        let cases = state.services.admin_service.list_cases(&context.user).await?;
        return Ok(Json(cases).into_response());
    }

    let case = state.services.case_service.my_case(&context.user).await?;
    Ok(Json(case).into_response())
}

pub async fn handle_create_case(
    State(state): State<AppState>,
    context: AuthContext,
    Json(input): Json<NewCaseInput>,
) -> Result<(StatusCode, Json<CreatedCase>)> {
    let created = state.services.case_service.create_case(&context.user, input).await?;
    let status = if created.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(created)))
}

pub async fn handle_edit_case(
    State(state): State<AppState>,
    context: AuthContext,
    Path(case_id): Path<Uuid>,
    Json(input): Json<EditCaseInput>,
) -> Result<Json<CaseView>> {
    Ok(Json(state.services.case_service.edit_case(&context.user, case_id, input).await?))
}

pub async fn handle_toggle_item(
    State(state): State<AppState>,
    context: AuthContext,
    Path(item_id): Path<Uuid>,
    Json(body): Json<ToggleBody>,
) -> Result<Json<CaseChecklistItem>> {
    Ok(Json(state.services.case_service.toggle_item(&context.user, item_id, body.completed).await?))
}

pub async fn handle_list_messages(
    State(state): State<AppState>,
    context: AuthContext,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Vec<CaseMessage>>> {
    Ok(Json(state.services.case_service.list_messages(&context.user, case_id).await?))
}

pub async fn handle_post_message(
    State(state): State<AppState>,
    context: AuthContext,
    Path(case_id): Path<Uuid>,
    Json(body): Json<MessageBody>,
) -> Result<(StatusCode, Json<CaseMessage>)> {
    let message = state.services.case_service.post_message(&context.user, case_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Live view of a case thread and its documents.
///
/// Sends a full snapshot on connect and again after every change notification
/// for this case.
pub async fn handle_case_events(
    State(state): State<AppState>,
    context: AuthContext,
    Path(case_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    state.services.case_service.authorize_case(&context.user, case_id).await?;

    let mut listener = PgListener::connect_with(state.services.database.pool()).await?;
    listener.listen_all(CASE_CHANNELS).await?;

    let services = state.services.clone();
    let user = context.user;
    let case_key = case_id.to_string();

    let stream = async_stream::stream! {
        for channel in CASE_CHANNELS {
            if let Some(event) = snapshot(&services, &user, case_id, channel).await {
                yield Ok(event);
            }
        }

        loop {
            match listener.recv().await {
                Ok(notification) if notification.payload() == case_key => {
                    debug!(case_id = %case_id, channel = notification.channel(), "Case change received");
                    if let Some(event) = snapshot(&services, &user, case_id, notification.channel()).await {
                        yield Ok(event);
                    }
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(case_id = %case_id, error = %e, "Case event listener failed");
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Reload whatever a channel covers and wrap it as an SSE event
async fn snapshot(
    services: &crate::services::ServiceFactory,
    user: &crate::models::user::User,
    case_id: Uuid,
    channel: &str,
) -> Option<Event> {
    let data = match channel {
        "case_messages" => services.case_service.list_messages(user, case_id).await
            .and_then(|messages| Ok(serde_json::to_value(messages)?)),
        "case_documents" => services.document_service.list(user, case_id).await
            .and_then(|documents| Ok(serde_json::to_value(documents)?)),
        _ => return None,
    };

    match data {
        Ok(data) => Event::default().event(channel).json_data(data).ok(),
        Err(e) => {
            warn!(case_id = %case_id, channel, error = %e, "Failed to reload case view");
            None
        }
    }
}
