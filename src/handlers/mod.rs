//! HTTP handlers module
//!
//! Thin axum handlers grouped by area. Each one extracts the caller, calls a
//! workflow service and serializes the result; errors render through
//! `VisaPilotError`'s `IntoResponse`.

pub mod health;
pub mod auth;
pub mod profile;
pub mod cases;
pub mod documents;
pub mod billing;
pub mod admin;
pub mod public;
pub mod multipart;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, patch, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::warn;
use crate::config::settings::ServerConfig;
use crate::middleware::logging::request_tracing;
use crate::middleware::rate_limit::limit_by_client;
use crate::state::AppState;

/// Headroom over the file limit for multipart framing and text fields
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// CORS for the configured browser origins; any origin when none are configured
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = server.cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let settings = state.services.settings.clone();
    let body_limit = (settings.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES) as usize;

    let limited = Router::new()
        .route("/contact", post(public::handle_contact))
        .route("/ai-chat", post(public::handle_ai_chat))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_by_client));

    let auth_routes = Router::new()
        .route("/signup", post(auth::handle_sign_up))
        .route("/resend-confirmation", post(auth::handle_resend_confirmation))
        .route("/login", post(auth::handle_login))
        .route("/callback", post(auth::handle_callback))
        .route("/complete-signup", post(auth::handle_complete_signup))
        .route("/start-trial", post(billing::handle_start_trial))
        .route("/logout", post(auth::handle_logout))
        .route("/delete-account", delete(auth::handle_delete_account))
        .route("/password-reset/request", post(auth::handle_password_reset_request))
        .route("/password-reset/verify", post(auth::handle_password_reset_verify))
        .route("/password-reset/complete", post(auth::handle_password_reset_complete));

    let admin_routes = Router::new()
        .route("/cases", get(admin::handle_list_cases))
        .route("/cases/:id", get(admin::handle_case_overview))
        .route("/cases/:id/status", patch(admin::handle_set_case_status))
        .route("/cases/:id/invoices", post(admin::handle_create_case_invoice))
        .route("/users", get(admin::handle_list_users))
        .route("/invoices", get(admin::handle_list_invoices).post(admin::handle_upload_client_invoice))
        .route("/mark-paid", post(admin::handle_mark_paid))
        .route("/sync-user-role", post(admin::handle_sync_user_role))
        .route("/generate-test-data", post(admin::handle_generate_test_data));

    let api = Router::new()
        .route("/sitemap.xml", get(public::handle_sitemap))
        .merge(limited)
        .nest("/auth", auth_routes)
        .route("/me", get(profile::handle_get_profile).patch(profile::handle_update_profile))
        .route("/cases", get(cases::handle_get_cases).post(cases::handle_create_case))
        .route("/cases/:id", patch(cases::handle_edit_case))
        .route("/cases/:id/messages", get(cases::handle_list_messages).post(cases::handle_post_message))
        .route("/cases/:id/events", get(cases::handle_case_events))
        .route("/checklist/:id/toggle", post(cases::handle_toggle_item))
        .route("/documents", get(documents::handle_list_documents).post(documents::handle_upload_document))
        .route("/documents/upload", post(documents::handle_upload_document))
        .route("/documents/:id", patch(documents::handle_review_document))
        .route("/documents/:id/download", get(documents::handle_download_document))
        .route("/invoices", get(billing::handle_list_invoices))
        .route("/invoices/download", get(billing::handle_invoice_download))
        .route("/payments/create-checkout-session", post(billing::handle_create_checkout))
        .route("/payments/invoice-checkout", post(billing::handle_invoice_checkout))
        .route("/webhooks/stripe", post(billing::handle_payment_webhook))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(health::handle_health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors_layer(&settings.server))
        .layer(middleware::from_fn(request_tracing))
        .with_state(state)
}
