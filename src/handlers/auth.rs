//! Auth route handlers
//!
//! Signup, login and password reset forward to the identity provider through
//! `AuthService`. Routes that act on an existing session take the token from
//! the `Authorization` header.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use crate::middleware::{AuthContext, BearerToken, IdentityContext};
use crate::services::auth::{CallbackInput, CallbackResponse, LoginInput, LoginResponse, SignUpInput, SignUpResponse};
use crate::services::identity::Session;
use crate::state::AppState;
use crate::utils::errors::Result;

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordBody {
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileBody {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

pub async fn handle_sign_up(
    State(state): State<AppState>,
    Json(input): Json<SignUpInput>,
) -> Result<(StatusCode, Json<SignUpResponse>)> {
    let response = state.services.auth_service.sign_up(input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn handle_resend_confirmation(
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> Result<Json<Value>> {
    state.services.auth_service.resend_confirmation(&body.email).await?;
    Ok(Json(json!({ "status": "sent" })))
}

pub async fn handle_login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<LoginResponse>> {
    Ok(Json(state.services.auth_service.login(input).await?))
}

pub async fn handle_callback(
    State(state): State<AppState>,
    Json(input): Json<CallbackInput>,
) -> Result<Json<CallbackResponse>> {
    Ok(Json(state.services.auth_service.callback(input).await?))
}

/// Profile completion for an already confirmed session
pub async fn handle_complete_signup(
    State(state): State<AppState>,
    context: IdentityContext,
    body: Option<Json<ProfileBody>>,
) -> Result<Json<CallbackResponse>> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let input = CallbackInput {
        access_token: Some(context.access_token),
        full_name: body.full_name,
        phone: body.phone,
        ..CallbackInput::default()
    };

    Ok(Json(state.services.auth_service.callback(input).await?))
}

pub async fn handle_logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode> {
    state.services.auth_service.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_delete_account(
    State(state): State<AppState>,
    context: AuthContext,
) -> Result<StatusCode> {
    state.services.user_service.delete_account(context.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_password_reset_request(
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> Result<Json<Value>> {
    state.services.auth_service.request_password_reset(&body.email).await?;
    Ok(Json(json!({ "status": "code_sent" })))
}

/// Returns the recovery session the final step needs
pub async fn handle_password_reset_verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeBody>,
) -> Result<Json<Session>> {
    Ok(Json(state.services.auth_service.verify_password_reset(&body.email, &body.code).await?))
}

pub async fn handle_password_reset_complete(
    State(state): State<AppState>,
    BearerToken(recovery_token): BearerToken,
    Json(body): Json<NewPasswordBody>,
) -> Result<Json<Value>> {
    state.services.auth_service.complete_password_reset(&recovery_token, &body.password).await?;
    Ok(Json(json!({ "status": "password_updated" })))
}
