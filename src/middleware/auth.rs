//! Authentication extractors
//!
//! Every protected handler takes one of these as an argument. The token is
//! verified and the profile row loaded once per request; the role is always
//! read from that row, never from the token.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::{debug, warn};
use crate::models::user::User;
use crate::services::admin::require_admin;
use crate::services::IdentityUser;
use crate::state::AppState;
use crate::utils::errors::VisaPilotError;

/// Token from an `Authorization: Bearer ...` header
pub fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Raw bearer token, unverified. Used where the identity provider itself
/// checks the token (logout, recovery sessions).
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = VisaPilotError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .map(BearerToken)
            .ok_or_else(|| VisaPilotError::Authentication("Missing bearer token".to_string()))
    }
}

/// Verified identity that may not have a profile row yet
#[derive(Debug, Clone)]
pub struct IdentityContext {
    pub identity: IdentityUser,
    pub access_token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for IdentityContext {
    type Rejection = VisaPilotError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(access_token) = BearerToken::from_request_parts(parts, state).await?;
        let identity = state.services.identity.verify_access_token(&access_token).await?;

        Ok(Self { identity, access_token })
    }
}

/// Signed-in user with a completed profile
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub access_token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = VisaPilotError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let IdentityContext { identity, access_token } = IdentityContext::from_request_parts(parts, state).await?;

        let user = state.services.user_service.find(identity.id).await?
            .ok_or_else(|| {
                debug!(user_id = %identity.id, "Token is valid but profile is missing");
                VisaPilotError::Authentication("Profile not found. Please complete signup".to_string())
            })?;

        Ok(Self { user, access_token })
    }
}

/// Signed-in admin
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

impl AdminContext {
    pub fn user(&self) -> &User {
        &self.0.user
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminContext {
    type Rejection = VisaPilotError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let context = AuthContext::from_request_parts(parts, state).await?;
        if let Err(e) = require_admin(&context.user) {
            warn!(user_id = %context.user.id, path = %parts.uri.path(), "Unauthorized admin access attempt");
            return Err(e);
        }

        Ok(Self(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))).as_deref(), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("bearer  xyz "))).as_deref(), Some("xyz"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let mut parts = parts(None);
        let result = BearerToken::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(VisaPilotError::Authentication(_))));
    }
}
