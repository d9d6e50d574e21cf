//! Identity service implementation
//!
//! Thin client for the hosted authentication service. Passwords, one-time
//! codes and session tokens are handled by the provider; this service forwards
//! requests and verifies bearer tokens.

use std::time::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::config::settings::IdentityConfig;
use crate::models::UserRole;
use crate::services::provider_error;
use crate::utils::errors::{VisaPilotError, Result};

/// Session issued by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub user: IdentityUser,
}

/// Provider-side user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
}

impl IdentityUser {
    /// Read a string field from the signup metadata
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.user_metadata
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .filter(|value| !value.trim().is_empty())
    }
}

/// Claims of a provider-issued access token
#[derive(Debug, Clone, Deserialize)]
struct AccessClaims {
    sub: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
    #[serde(default)]
    app_metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub redirect_to: String,
}

/// Result of a signup call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user_id: Option<Uuid>,
    /// False when the account exists but the confirmation mail could not be sent
    pub confirmation_sent: bool,
}

/// Whether a provider error means the account was created but its mail failed
pub fn is_confirmation_mail_failure(error: &VisaPilotError) -> bool {
    match error {
        VisaPilotError::Provider { message, .. } => {
            let message = message.to_lowercase();
            message.contains("confirmation email") || message.contains("sending email")
        }
        _ => false,
    }
}

/// Identity service backed by the hosted auth REST API
#[derive(Clone)]
#[derive(Debug)]
pub struct IdentityService {
    client: Client,
    config: IdentityConfig,
}

impl IdentityService {
    pub fn new(config: IdentityConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("VisaPilot/1.0")
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Request authenticated with the public key only
    fn public(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    /// Request acting on behalf of a signed-in user
    fn as_user(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
    }

    /// Request with the service role, for admin endpoints
    fn as_service(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(provider_error("identity", response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(provider_error("identity", response).await);
        }
        Ok(())
    }

    /// Register an account; the provider mails the confirmation link
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome> {
        debug!(email = %request.email, "Signing up");

        let builder = self.public(self.client.post(self.endpoint("signup")))
            .query(&[("redirect_to", request.redirect_to.as_str())])
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": {
                    "full_name": request.full_name,
                    "phone": request.phone,
                },
            }));

        match self.send_json::<serde_json::Value>(builder).await {
            Ok(body) => {
                // Depending on provider settings the user is returned bare or inside a session
                let user_id = body.get("id")
                    .or_else(|| body.get("user").and_then(|user| user.get("id")))
                    .and_then(|id| id.as_str())
                    .and_then(|id| Uuid::parse_str(id).ok());
                Ok(SignUpOutcome { user_id, confirmation_sent: true })
            }
            Err(e) if is_confirmation_mail_failure(&e) => {
                warn!(email = %request.email, error = %e, "Account created but confirmation mail failed");
                Ok(SignUpOutcome { user_id: None, confirmation_sent: false })
            }
            Err(e) => Err(e),
        }
    }

    /// Send the signup confirmation mail again
    pub async fn resend_confirmation(&self, email: &str, redirect_to: &str) -> Result<()> {
        let builder = self.public(self.client.post(self.endpoint("resend")))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "type": "signup", "email": email }));

        self.send_empty(builder).await
    }

    /// Password grant
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let builder = self.public(self.client.post(self.endpoint("token")))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        self.send_json(builder).await
    }

    /// Exchange an authorization code from the confirmation link for a session
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Session> {
        let builder = self.public(self.client.post(self.endpoint("token")))
            .query(&[("grant_type", "pkce")])
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }));

        self.send_json(builder).await
    }

    /// Fetch the user a token belongs to
    pub async fn get_user(&self, access_token: &str) -> Result<IdentityUser> {
        let builder = self.as_user(self.client.get(self.endpoint("user")), access_token);
        self.send_json(builder).await.map_err(|e| match e {
            VisaPilotError::Provider { status: 401 | 403, message, .. } => VisaPilotError::Authentication(message),
            other => other,
        })
    }

    /// Resolve a bearer token to its user.
    ///
    /// Verified locally when the signing secret is configured, otherwise by the provider.
    pub async fn verify_access_token(&self, access_token: &str) -> Result<IdentityUser> {
        match self.config.jwt_secret.as_deref() {
            Some(secret) => self.decode_access_token(access_token, secret),
            None => self.get_user(access_token).await,
        }
    }

    fn decode_access_token(&self, access_token: &str, secret: &str) -> Result<IdentityUser> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        let data = jsonwebtoken::decode::<AccessClaims>(
            access_token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "Rejected access token");
            VisaPilotError::Authentication("Invalid or expired session".to_string())
        })?;

        Ok(IdentityUser {
            id: data.claims.sub,
            email: data.claims.email,
            user_metadata: data.claims.user_metadata,
            app_metadata: data.claims.app_metadata,
        })
    }

    /// End a session
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let builder = self.as_user(self.client.post(self.endpoint("logout")), access_token);
        self.send_empty(builder).await
    }

    /// Mail a password recovery code
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let builder = self.public(self.client.post(self.endpoint("recover")))
            .json(&json!({ "email": email }));

        self.send_empty(builder).await
    }

    /// Trade a recovery code for a short-lived recovery session
    pub async fn verify_recovery_code(&self, email: &str, code: &str) -> Result<Session> {
        let builder = self.public(self.client.post(self.endpoint("verify")))
            .json(&json!({ "type": "recovery", "email": email, "token": code }));

        self.send_json(builder).await
    }

    /// Set a new password for the session's user
    pub async fn update_password(&self, access_token: &str, password: &str) -> Result<()> {
        let builder = self.as_user(self.client.put(self.endpoint("user")), access_token)
            .json(&json!({ "password": password }));

        self.send_empty(builder).await
    }

    /// Delete an account; dependent rows go with it
    pub async fn admin_delete_user(&self, user_id: Uuid) -> Result<()> {
        let builder = self.as_service(self.client.delete(self.endpoint(&format!("admin/users/{}", user_id))));
        self.send_empty(builder).await?;

        info!(user_id = %user_id, "Identity deleted");
        Ok(())
    }

    /// Mirror a role into the provider's app metadata
    pub async fn admin_set_role(&self, user_id: Uuid, role: UserRole) -> Result<()> {
        let builder = self.as_service(self.client.put(self.endpoint(&format!("admin/users/{}", user_id))))
            .json(&json!({ "app_metadata": { "role": role.as_str() } }));

        self.send_empty(builder).await
    }
}
