//! Authentication service implementation
//!
//! Signup, login with portal-aware landing, confirmation callback and the
//! three-step password reset. Credentials never touch this service beyond
//! being forwarded to the identity provider.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::models::user::User;
use crate::services::identity::{IdentityService, Session, SignUpRequest};
use crate::services::user::{ProfileFields, UserService};
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::{is_valid_email, required_field};
use crate::utils::logging::log_user_action;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Login surface a user signs in through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    #[default]
    Client,
    Admin,
}

/// Where a freshly signed-in user is sent, or why they may not use this portal
pub fn landing_route(portal: Portal, user: &User) -> Result<&'static str> {
    match (portal, user.is_admin()) {
        (Portal::Admin, true) => Ok("/admin"),
        (Portal::Admin, false) => Err(VisaPilotError::PermissionDenied(
            "This account does not have admin access. Please sign in at /login".to_string(),
        )),
        (Portal::Client, true) => Err(VisaPilotError::PermissionDenied(
            "Administrators must sign in at /admin/login".to_string(),
        )),
        (Portal::Client, false) if user.paid_at.is_some() => Ok("/dashboard"),
        (Portal::Client, false) => Ok("/pending-payment"),
    }
}

fn validate_email(email: &str) -> Result<String> {
    let email = required_field(email, "Email")?.to_lowercase();
    if !is_valid_email(&email) {
        return Err(VisaPilotError::InvalidInput("Email address is invalid".to_string()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(VisaPilotError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpResponse {
    pub status: &'static str,
    pub can_resend: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub portal: Portal,
}

/// Session plus the page the browser should open next
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub session: Session,
    pub user: User,
    pub redirect_to: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackInput {
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub access_token: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallbackResponse {
    pub session: Option<Session>,
    pub user: User,
    pub redirect_to: &'static str,
}

/// Authentication service
#[derive(Clone)]
#[derive(Debug)]
pub struct AuthService {
    identity: IdentityService,
    users: UserService,
    public_base_url: String,
}

impl AuthService {
    pub fn new(identity: IdentityService, users: UserService, public_base_url: String) -> Self {
        Self { identity, users, public_base_url }
    }

    fn confirmation_redirect(&self) -> String {
        format!("{}/auth/callback", self.public_base_url.trim_end_matches('/'))
    }

    /// Register an account pending e-mail confirmation
    pub async fn sign_up(&self, input: SignUpInput) -> Result<SignUpResponse> {
        let email = validate_email(&input.email)?;
        validate_password(&input.password)?;
        let full_name = required_field(&input.full_name, "Full name")?;

        let outcome = self.identity.sign_up(&SignUpRequest {
            email: email.clone(),
            password: input.password,
            full_name,
            phone: input.phone.map(|phone| phone.trim().to_string()).filter(|phone| !phone.is_empty()),
            redirect_to: self.confirmation_redirect(),
        }).await?;

        info!(email = %email, confirmation_sent = outcome.confirmation_sent, "Signup accepted");
        Ok(SignUpResponse {
            status: "pending_confirmation",
            can_resend: !outcome.confirmation_sent,
        })
    }

    pub async fn resend_confirmation(&self, email: &str) -> Result<()> {
        let email = validate_email(email)?;
        self.identity.resend_confirmation(&email, &self.confirmation_redirect()).await
    }

    /// Password login through a portal.
    ///
    /// A session opened through the wrong portal is signed out again before failing.
    pub async fn login(&self, input: LoginInput) -> Result<LoginResponse> {
        let email = validate_email(&input.email)?;
        if input.password.is_empty() {
            return Err(VisaPilotError::InvalidInput("Password is required".to_string()));
        }

        let session = self.identity.sign_in_with_password(&email, &input.password).await?;

        let user = match self.users.find(session.user.id).await? {
            Some(user) => user,
            None => self.users.complete_profile(&session.user, ProfileFields::default()).await?,
        };

        match landing_route(input.portal, &user) {
            Ok(redirect_to) => {
                log_user_action(user.id, "login", Some(redirect_to));
                Ok(LoginResponse { session, user, redirect_to })
            }
            Err(e) => {
                if let Err(sign_out_error) = self.identity.sign_out(&session.access_token).await {
                    warn!(user_id = %user.id, error = %sign_out_error, "Failed to revoke session after portal mismatch");
                }
                warn!(user_id = %user.id, portal = ?input.portal, "Login through wrong portal");
                Err(e)
            }
        }
    }

    /// Finish the confirmation link: obtain a session and make sure the profile exists
    pub async fn callback(&self, input: CallbackInput) -> Result<CallbackResponse> {
        let fields = ProfileFields { full_name: input.full_name, phone: input.phone };

        let (session, identity_user) = match (input.code, input.access_token) {
            (Some(code), _) => {
                let verifier = input.code_verifier.unwrap_or_default();
                let session = self.identity.exchange_code(&code, &verifier).await?;
                let identity_user = session.user.clone();
                (Some(session), identity_user)
            }
            (None, Some(token)) => (None, self.identity.get_user(&token).await?),
            (None, None) => {
                return Err(VisaPilotError::InvalidInput("Missing confirmation code".to_string()));
            }
        };

        let user = self.users.complete_profile(&identity_user, fields).await?;
        let redirect_to = if user.is_admin() {
            "/admin"
        } else {
            landing_route(Portal::Client, &user)?
        };

        Ok(CallbackResponse { session, user, redirect_to })
    }

    pub async fn logout(&self, access_token: &str) -> Result<()> {
        self.identity.sign_out(access_token).await
    }

    /// Step 1: mail a recovery code
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = validate_email(email)?;
        self.identity.request_password_reset(&email).await?;
        info!(email = %email, "Password reset requested");
        Ok(())
    }

    /// Step 2: trade the code for a recovery session; nothing is issued on failure
    pub async fn verify_password_reset(&self, email: &str, code: &str) -> Result<Session> {
        let email = validate_email(email)?;
        let code = required_field(code, "Code")?;
        self.identity.verify_recovery_code(&email, &code).await
    }

    /// Step 3: set the new password with the recovery session from step 2
    pub async fn complete_password_reset(&self, recovery_token: &str, new_password: &str) -> Result<()> {
        validate_password(new_password)?;
        self.identity.update_password(recovery_token, new_password).await?;

        let user = self.identity.get_user(recovery_token).await?;
        log_user_action(user.id, "password_reset", None);
        Ok(())
    }
}
