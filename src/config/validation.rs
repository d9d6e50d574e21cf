//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{VisaPilotError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_server_config(&settings.server)?;
    validate_database_config(&settings.database)?;
    validate_identity_config(&settings.identity)?;
    validate_storage_config(&settings.storage)?;
    validate_payments_config(&settings.payments)?;
    validate_assistant_config(&settings.assistant)?;
    validate_rate_limit_config(&settings.rate_limit)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

fn validate_url(value: &str, what: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| VisaPilotError::Config(format!("{} is not a valid URL: {}", what, e)))
}

/// Validate server configuration
fn validate_server_config(config: &super::ServerConfig) -> Result<()> {
    if config.port == 0 {
        return Err(VisaPilotError::Config(
            "Server port must be greater than 0".to_string()
        ));
    }

    validate_url(&config.public_base_url, "Public base URL")
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(VisaPilotError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(VisaPilotError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(VisaPilotError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate identity provider configuration
fn validate_identity_config(config: &super::IdentityConfig) -> Result<()> {
    validate_url(&config.url, "Identity URL")?;

    if config.anon_key.is_empty() {
        return Err(VisaPilotError::Config(
            "Identity anon key is required".to_string()
        ));
    }

    if config.service_role_key.is_empty() {
        return Err(VisaPilotError::Config(
            "Identity service role key is required".to_string()
        ));
    }

    if matches!(config.jwt_secret.as_deref(), Some("")) {
        return Err(VisaPilotError::Config(
            "Identity JWT secret must not be empty when set".to_string()
        ));
    }

    Ok(())
}

/// Validate object storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    validate_url(&config.url, "Storage URL")?;

    if config.service_key.is_empty() {
        return Err(VisaPilotError::Config(
            "Storage service key is required".to_string()
        ));
    }

    if config.documents_bucket.is_empty() || config.invoices_bucket.is_empty() {
        return Err(VisaPilotError::Config(
            "Storage bucket names are required".to_string()
        ));
    }

    if config.signed_url_ttl_seconds == 0 {
        return Err(VisaPilotError::Config(
            "Signed URL lifetime must be greater than 0".to_string()
        ));
    }

    if config.max_upload_bytes == 0 {
        return Err(VisaPilotError::Config(
            "Max upload size must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate payments configuration
fn validate_payments_config(config: &super::PaymentsConfig) -> Result<()> {
    validate_url(&config.api_url, "Payments API URL")?;

    if config.secret_key.is_empty() {
        return Err(VisaPilotError::Config(
            "Payments secret key is required".to_string()
        ));
    }

    if config.webhook_secret.is_empty() {
        return Err(VisaPilotError::Config(
            "Payments webhook secret is required".to_string()
        ));
    }

    if config.plans.is_empty() {
        return Err(VisaPilotError::Config(
            "At least one checkout plan must be configured".to_string()
        ));
    }

    if let Some(plan) = config.plans.iter().find(|plan| plan.amount <= 0) {
        return Err(VisaPilotError::Config(
            format!("Plan {} must have a positive amount", plan.name)
        ));
    }

    if config.trial_days <= 0 {
        return Err(VisaPilotError::Config(
            "Trial length must be greater than 0 days".to_string()
        ));
    }

    Ok(())
}

/// Validate assistant configuration
fn validate_assistant_config(config: &super::AssistantConfig) -> Result<()> {
    if config.max_history == 0 || config.max_message_chars == 0 {
        return Err(VisaPilotError::Config(
            "Assistant history and message limits must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate rate limiting configuration
fn validate_rate_limit_config(config: &super::RateLimitSettings) -> Result<()> {
    if config.max_requests == 0 || config.window_seconds == 0 {
        return Err(VisaPilotError::Config(
            "Rate limit requests and window must be greater than 0".to_string()
        ));
    }

    for proxy in &config.trusted_proxies {
        if proxy.parse::<std::net::IpAddr>().is_err() {
            return Err(VisaPilotError::Config(
                format!("Trusted proxy '{}' is not an IP address", proxy)
            ));
        }
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(VisaPilotError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(VisaPilotError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
