//! User service implementation
//!
//! Profile rows keyed by the identity provider's user id: completion after
//! signup confirmation, self-service edits and account deletion.

use tracing::{debug, info};
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::user::{CreateUserRequest, UpdateProfileRequest, User};
use crate::services::identity::{IdentityService, IdentityUser};
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::{is_valid_phone, normalize_whitespace};
use crate::utils::logging::log_user_action;

/// Optional profile fields supplied at completion time
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileFields {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|name| normalize_whitespace(&name)).filter(|name| !name.is_empty())
}

fn clean_phone(phone: Option<String>) -> Result<Option<String>> {
    match phone.map(|phone| phone.trim().to_string()).filter(|phone| !phone.is_empty()) {
        Some(phone) if !is_valid_phone(&phone) => {
            Err(VisaPilotError::InvalidInput("Phone number is invalid".to_string()))
        }
        other => Ok(other),
    }
}

/// User service for profile operations
#[derive(Clone)]
#[derive(Debug)]
pub struct UserService {
    database: DatabaseService,
    identity: IdentityService,
}

impl UserService {
    pub fn new(database: DatabaseService, identity: IdentityService) -> Self {
        Self { database, identity }
    }

    /// Create the profile row for a confirmed identity if it does not exist yet.
    ///
    /// Explicit fields win over the metadata captured at signup.
    pub async fn complete_profile(&self, identity_user: &IdentityUser, fields: ProfileFields) -> Result<User> {
        let email = identity_user.email.clone()
            .ok_or_else(|| VisaPilotError::InvalidInput("Account has no e-mail address".to_string()))?;

        let request = CreateUserRequest {
            id: identity_user.id,
            email,
            full_name: clean_name(fields.full_name.or_else(|| identity_user.metadata_str("full_name"))),
            phone: clean_phone(fields.phone.or_else(|| identity_user.metadata_str("phone")))?,
        };

        debug!(user_id = %request.id, "Completing profile");
        self.database.ensure_profile(request).await
    }

    /// Profile row of an identity, if completed
    pub async fn find(&self, user_id: Uuid) -> Result<Option<User>> {
        self.database.users.find_by_id(user_id).await
    }

    /// Self-service edit of name and phone
    pub async fn update_profile(&self, caller: &User, request: UpdateProfileRequest) -> Result<User> {
        let request = UpdateProfileRequest {
            full_name: clean_name(request.full_name),
            phone: clean_phone(request.phone)?,
        };

        let user = self.database.users.update_profile(caller.id, request).await?;
        log_user_action(caller.id, "profile_updated", None);
        Ok(user)
    }

    /// Delete the caller's identity; owned rows follow through foreign keys
    pub async fn delete_account(&self, caller_id: Uuid) -> Result<()> {
        self.identity.admin_delete_user(caller_id).await?;
        // The profile row may live in a separate store from the identity
        self.database.users.delete(caller_id).await?;

        info!(user_id = %caller_id, "Account deleted");
        log_user_action(caller_id, "account_deleted", None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name(Some("  Ada   Client ".to_string())).as_deref(), Some("Ada Client"));
        assert_eq!(clean_name(Some("   ".to_string())), None);
        assert_eq!(clean_name(None), None);
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone(Some(" +1 555 123 4567 ".to_string())).unwrap().as_deref(), Some("+1 555 123 4567"));
        assert_eq!(clean_phone(Some("".to_string())).unwrap(), None);
        assert!(clean_phone(Some("call me".to_string())).is_err());
    }
}
