//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use std::path::Path;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub storage: StorageConfig,
    pub payments: PaymentsConfig,
    pub assistant: AssistantConfig,
    pub email: EmailConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin of the web application, used for redirects and the sitemap
    pub public_base_url: String,
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Hosted authentication service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Base URL of the auth REST API, e.g. `https://project.example.co/auth/v1`
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
    /// Session token signing secret. When absent, tokens are checked by the provider.
    pub jwt_secret: Option<String>,
    pub jwt_audience: String,
    pub timeout_seconds: u64,
}

/// Hosted object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base URL of the storage REST API, e.g. `https://project.example.co/storage/v1`
    pub url: String,
    pub service_key: String,
    pub documents_bucket: String,
    pub invoices_bucket: String,
    pub signed_url_ttl_seconds: u64,
    pub max_upload_bytes: u64,
    pub timeout_seconds: u64,
}

/// Subscription plan offered at checkout
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlanConfig {
    pub name: String,
    pub display_name: String,
    /// Price in minor currency units
    pub amount: i64,
}

/// Payments provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentsConfig {
    pub api_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_seconds: i64,
    pub currency: String,
    pub trial_days: i64,
    pub plans: Vec<PlanConfig>,
    pub timeout_seconds: u64,
}

/// LLM assistant configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantConfig {
    pub openai_api_key: Option<String>,
    pub openai_url: String,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_url: String,
    pub anthropic_model: String,
    pub max_history: usize,
    pub max_message_chars: usize,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
}

/// Transactional e-mail configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    pub contact_recipient: String,
}

/// Rate limiting for the public, unauthenticated endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_seconds: u64,
    pub burst_allowance: u32,
    /// Reverse proxies whose `x-forwarded-for` / `x-real-ip` headers are believed
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("VISAPILOT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Load settings from an explicit file, still layered over the defaults
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::from(path))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::VisaPilotError> {
        super::validation::validate_settings(self)
    }

    /// Find a checkout plan by name
    pub fn plan(&self, name: &str) -> Option<&PlanConfig> {
        self.payments.plans.iter().find(|plan| plan.name == name)
    }

    /// Socket address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                public_base_url: "http://localhost:3000".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/visapilot".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            identity: IdentityConfig {
                url: "http://localhost:9999/auth/v1".to_string(),
                anon_key: String::new(),
                service_role_key: String::new(),
                jwt_secret: None,
                jwt_audience: "authenticated".to_string(),
                timeout_seconds: 10,
            },
            storage: StorageConfig {
                url: "http://localhost:9999/storage/v1".to_string(),
                service_key: String::new(),
                documents_bucket: "documents".to_string(),
                invoices_bucket: "invoices".to_string(),
                signed_url_ttl_seconds: 60,
                max_upload_bytes: 10 * 1024 * 1024,
                timeout_seconds: 60,
            },
            payments: PaymentsConfig {
                api_url: "https://api.stripe.com".to_string(),
                secret_key: String::new(),
                webhook_secret: String::new(),
                webhook_tolerance_seconds: 300,
                currency: "usd".to_string(),
                trial_days: 14,
                plans: vec![
                    PlanConfig {
                        name: "standard".to_string(),
                        display_name: "Standard Case Support".to_string(),
                        amount: 29_900,
                    },
                    PlanConfig {
                        name: "premium".to_string(),
                        display_name: "Premium Case Support".to_string(),
                        amount: 59_900,
                    },
                ],
                timeout_seconds: 20,
            },
            assistant: AssistantConfig {
                openai_api_key: None,
                openai_url: "https://api.openai.com/v1".to_string(),
                openai_model: "gpt-4o-mini".to_string(),
                anthropic_api_key: None,
                anthropic_url: "https://api.anthropic.com/v1".to_string(),
                anthropic_model: "claude-3-5-haiku-latest".to_string(),
                max_history: 20,
                max_message_chars: 4000,
                max_output_tokens: 1024,
                timeout_seconds: 30,
            },
            email: EmailConfig {
                api_url: "https://api.resend.com".to_string(),
                api_key: String::new(),
                from_address: "VisaPilot <no-reply@localhost>".to_string(),
                contact_recipient: "office@localhost".to_string(),
            },
            rate_limit: RateLimitSettings {
                max_requests: 20,
                window_seconds: 60,
                burst_allowance: 5,
                trusted_proxies: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                json: false,
            },
        }
    }
}
