//! Trial, checkout, invoice and payment webhook handlers

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use crate::middleware::AuthContext;
use crate::models::billing::Subscription;
use crate::services::billing::{CheckoutInput, CheckoutResponse, InvoiceCheckoutInput, InvoiceCheckoutResponse, InvoiceList};
use crate::services::documents::DownloadLink;
use crate::state::AppState;
use crate::utils::errors::{VisaPilotError, Result};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub id: Uuid,
}

pub async fn handle_start_trial(
    State(state): State<AppState>,
    context: AuthContext,
) -> Result<(StatusCode, Json<Subscription>)> {
    let subscription = state.services.billing_service.start_trial(&context.user).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn handle_create_checkout(
    State(state): State<AppState>,
    context: AuthContext,
    Json(input): Json<CheckoutInput>,
) -> Result<Json<CheckoutResponse>> {
    Ok(Json(state.services.billing_service.create_checkout(&context.user, input).await?))
}

pub async fn handle_invoice_checkout(
    State(state): State<AppState>,
    context: AuthContext,
    Json(input): Json<InvoiceCheckoutInput>,
) -> Result<Json<InvoiceCheckoutResponse>> {
    Ok(Json(state.services.billing_service.invoice_checkout(&context.user, input).await?))
}

pub async fn handle_list_invoices(
    State(state): State<AppState>,
    context: AuthContext,
) -> Result<Json<InvoiceList>> {
    Ok(Json(state.services.billing_service.list_invoices(&context.user).await?))
}

pub async fn handle_invoice_download(
    State(state): State<AppState>,
    context: AuthContext,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<DownloadLink>> {
    Ok(Json(state.services.billing_service.invoice_download(&context.user, query.id).await?))
}

/// Payment provider events. The body is verified byte-for-byte, so it is taken raw.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| VisaPilotError::InvalidInput("Missing webhook signature".to_string()))?;

    let outcome = state.services.billing_service.handle_webhook(&body, signature).await?;
    Ok(Json(json!({ "received": true, "duplicate": outcome.duplicate })))
}
