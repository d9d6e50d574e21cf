//! Transactional e-mail service

use std::time::Duration;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use crate::config::settings::EmailConfig;
use crate::services::provider_error;
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::{is_valid_email, is_valid_phone, required_field, truncate_chars};

const MAX_CONTACT_MESSAGE_CHARS: usize = 5000;

/// Contact form submission
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
}

impl ContactRequest {
    /// Trimmed copy with required fields and formats checked
    pub fn validated(&self) -> Result<ContactRequest> {
        let name = required_field(&self.name, "Name")?;
        let email = required_field(&self.email, "Email")?;
        let message = required_field(&self.message, "Message")?;

        if !is_valid_email(&email) {
            return Err(VisaPilotError::InvalidInput("Email address is invalid".to_string()));
        }

        let phone = self.phone.as_deref().map(str::trim).filter(|phone| !phone.is_empty());
        if let Some(phone) = phone {
            if !is_valid_phone(phone) {
                return Err(VisaPilotError::InvalidInput("Phone number is invalid".to_string()));
            }
        }

        Ok(ContactRequest {
            name,
            email,
            phone: phone.map(str::to_string),
            message: truncate_chars(&message, MAX_CONTACT_MESSAGE_CHARS),
        })
    }

    fn body(&self) -> String {
        format!(
            "Name: {}\nEmail: {}\nPhone: {}\n\n{}",
            self.name,
            self.email,
            self.phone.as_deref().unwrap_or("-"),
            self.message
        )
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

#[derive(Clone)]
#[derive(Debug)]
pub struct EmailService {
    client: Client,
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("VisaPilot/1.0")
            .build()?;

        Ok(Self { client, config })
    }

    /// Forward a contact form to the office inbox, replying to the sender
    pub async fn send_contact(&self, request: &ContactRequest) -> Result<()> {
        if self.config.api_key.is_empty() {
            return Err(VisaPilotError::ServiceUnavailable("E-mail delivery is not configured".to_string()));
        }

        let response = self.client
            .post(format!("{}/emails", self.config.api_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "from": self.config.from_address,
                "to": [self.config.contact_recipient],
                "reply_to": request.email,
                "subject": format!("New contact request from {}", request.name),
                "text": request.body(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("email", response).await);
        }

        let sent: SendResponse = response.json().await?;
        info!(message_id = sent.id.as_deref().unwrap_or("-"), "Contact request sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, phone: Option<&str>, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_validation() {
        let valid = request(" Ada ", "ada@example.com", Some(" "), "Hello").validated().unwrap();
        assert_eq!(valid.name, "Ada");
        assert_eq!(valid.phone, None);

        assert!(request("", "ada@example.com", None, "Hello").validated().is_err());
        assert!(request("Ada", "ada", None, "Hello").validated().is_err());
        assert!(request("Ada", "ada@example.com", Some("abc"), "Hello").validated().is_err());
        assert!(request("Ada", "ada@example.com", None, "   ").validated().is_err());
    }

    #[test]
    fn test_body_includes_fields() {
        let body = request("Ada", "ada@example.com", None, "Need help").body();
        assert!(body.contains("Name: Ada"));
        assert!(body.contains("Phone: -"));
        assert!(body.ends_with("Need help"));
    }
}
