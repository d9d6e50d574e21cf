//! Payments service implementation
//!
//! Hosted checkout sessions and webhook signature verification against a
//! Stripe-compatible API.

use std::collections::BTreeMap;
use std::time::Duration;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use uuid::Uuid;
use crate::config::settings::PaymentsConfig;
use crate::services::provider_error;
use crate::utils::errors::{VisaPilotError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Session returned by the provider
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// One-item hosted checkout
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub product_name: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub customer_email: Option<String>,
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSessionRequest {
    /// Form fields in the provider's bracketed encoding
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("client_reference_id".to_string(), self.client_reference_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), self.amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), self.product_name.clone()),
        ];

        if let Some(email) = &self.customer_email {
            fields.push(("customer_email".to_string(), email.clone()));
        }

        for (key, value) in &self.metadata {
            fields.push((format!("metadata[{}]", key), value.clone()));
            fields.push((format!("payment_intent_data[metadata][{}]", key), value.clone()));
        }

        fields
    }
}

/// Webhook event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Rows a completed checkout points at, read from the session metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutReferences {
    pub subscription_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub user_invoice_id: Option<Uuid>,
    pub payment_intent_id: Option<String>,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| VisaPilotError::InvalidInput(format!("Malformed webhook payload: {}", e)))
    }

    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }

    /// Metadata references of a checkout session object
    pub fn checkout_references(&self) -> CheckoutReferences {
        let object = &self.data.object;
        let metadata_id = |key: &str| {
            object
                .get("metadata")
                .and_then(|metadata| metadata.get(key))
                .and_then(|value| value.as_str())
                .and_then(|value| Uuid::parse_str(value).ok())
        };

        CheckoutReferences {
            subscription_id: metadata_id("subscription_id"),
            invoice_id: metadata_id("invoice_id"),
            user_invoice_id: metadata_id("user_invoice_id"),
            payment_intent_id: object
                .get("payment_intent")
                .and_then(|value| value.as_str())
                .map(str::to_string),
        }
    }
}

/// Verify a `t=<unix>,v1=<hex>` signature header over the raw payload.
///
/// Any of several `v1` entries may match; the timestamp must be within `tolerance_seconds` of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<()> {
    let invalid = || VisaPilotError::InvalidInput("Invalid webhook signature".to_string());

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(invalid)?;
    if signatures.is_empty() {
        return Err(invalid());
    }

    let issued_at: i64 = timestamp.parse().map_err(|_| invalid())?;
    if now.abs_diff(issued_at) > tolerance_seconds.max(0) as u64 {
        return Err(VisaPilotError::InvalidInput("Webhook signature timestamp outside tolerance".to_string()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| invalid())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let matched = signatures
        .iter()
        .any(|signature| bool::from(expected.as_bytes().ct_eq(signature.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Payments provider client
#[derive(Clone)]
#[derive(Debug)]
pub struct PaymentsService {
    client: Client,
    config: PaymentsConfig,
}

impl PaymentsService {
    pub fn new(config: PaymentsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("VisaPilot/1.0")
            .build()?;

        Ok(Self { client, config })
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// Open a hosted checkout session
    pub async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_url.trim_end_matches('/'));
        debug!(reference = %request.client_reference_id, amount = request.amount, "Creating checkout session");

        let response = self.client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(&request.form_fields())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("payments", response).await);
        }

        let session: CheckoutSession = response.json().await?;
        info!(session_id = %session.id, reference = %request.client_reference_id, "Checkout session created");
        Ok(session)
    }

    /// Verify and parse a webhook delivery
    pub fn verify_event(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        verify_webhook_signature(
            payload,
            signature_header,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_seconds,
            chrono::Utc::now().timestamp(),
        )?;

        WebhookEvent::parse(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_rejects_tampered_payload_and_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(br#"{"id":"evt_2"}"#, &header, "whsec_test", 300, 1_700_000_000).is_err());
        assert!(verify_webhook_signature(payload, &header, "whsec_other", 300, 1_700_000_000).is_err());
        assert!(verify_webhook_signature(payload, "v1=abc", "whsec_test", 300, 1_700_000_000).is_err());
        assert!(verify_webhook_signature(payload, "garbage", "whsec_test", 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_rejects_stale_timestamp() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 300, 1_700_000_301).is_err());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected_without_overflow() {
        let payload = br#"{"id":"evt_1"}"#;
        let far_past = sign(payload, "whsec_test", -9_223_372_036_854_775_000);
        assert!(matches!(
            verify_webhook_signature(payload, &far_past, "whsec_test", 300, 1_700_000_000),
            Err(VisaPilotError::InvalidInput(_))
        ));

        let far_future = sign(payload, "whsec_test", i64::MAX);
        assert!(verify_webhook_signature(payload, &far_future, "whsec_test", 300, i64::MIN).is_err());
    }

    #[test]
    fn test_accepts_any_matching_v1() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        let rotated = header.replace("v1=", "v1=deadbeef,v1=");
        assert!(verify_webhook_signature(payload, &rotated, "whsec_test", 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_checkout_references() {
        let subscription_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test",
                "payment_intent": "pi_123",
                "metadata": { "subscription_id": subscription_id.to_string(), "user_id": "x" }
            }}
        });
        let event = WebhookEvent::parse(payload.to_string().as_bytes()).unwrap();
        assert!(event.is_checkout_completed());
        assert_eq!(event.checkout_references(), CheckoutReferences {
            subscription_id: Some(subscription_id),
            invoice_id: None,
            user_invoice_id: None,
            payment_intent_id: Some("pi_123".to_string()),
        });
    }

    #[test]
    fn test_form_fields_carry_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("subscription_id".to_string(), "sub-1".to_string());
        let request = CheckoutSessionRequest {
            product_name: "Standard Case Support".to_string(),
            amount: 29_900,
            currency: "usd".to_string(),
            customer_email: Some("client@example.com".to_string()),
            client_reference_id: "user-1".to_string(),
            success_url: "https://app.example.com/payment-success".to_string(),
            cancel_url: "https://app.example.com/pricing".to_string(),
            metadata,
        };
        let fields = request.form_fields();
        assert!(fields.contains(&("metadata[subscription_id]".to_string(), "sub-1".to_string())));
        assert!(fields.contains(&("line_items[0][price_data][unit_amount]".to_string(), "29900".to_string())));
        assert!(fields.contains(&("customer_email".to_string(), "client@example.com".to_string())));
    }
}
