//! Object storage service implementation
//!
//! Private buckets on the hosted storage REST API. Files are never served by
//! this service; callers get short-lived signed URLs instead.

use std::time::Duration;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use crate::config::settings::StorageConfig;
use crate::services::provider_error;
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::{generate_random_string, sanitize_filename};

/// Bucket an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Documents,
    Invoices,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Object key under a prefix, unique per upload and safe for URLs
pub fn object_path(prefix: &str, file_name: &str) -> String {
    format!("{}/{}-{}", prefix, generate_random_string(12), sanitize_filename(file_name))
}

#[derive(Clone)]
#[derive(Debug)]
pub struct StorageService {
    client: Client,
    config: StorageConfig,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("VisaPilot/1.0")
            .build()?;

        Ok(Self { client, config })
    }

    pub fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Documents => &self.config.documents_bucket,
            Bucket::Invoices => &self.config.invoices_bucket,
        }
    }

    /// Lifetime of minted download links
    pub fn signed_url_ttl_seconds(&self) -> u64 {
        self.config.signed_url_ttl_seconds
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    /// Store an object; existing keys are never overwritten
    pub async fn upload(&self, bucket: Bucket, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        if bytes.is_empty() {
            return Err(VisaPilotError::InvalidInput("File is empty".to_string()));
        }
        if bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(VisaPilotError::InvalidInput(format!(
                "File exceeds the {} upload limit",
                crate::utils::helpers::format_bytes(self.config.max_upload_bytes)
            )));
        }

        let size = bytes.len();
        let url = self.endpoint(&format!("object/{}/{}", self.bucket_name(bucket), path));
        let response = self.authorized(self.client.post(&url))
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("storage", response).await);
        }

        debug!(bucket = self.bucket_name(bucket), path, size, "Object stored");
        Ok(())
    }

    /// Delete an object
    pub async fn remove(&self, bucket: Bucket, path: &str) -> Result<()> {
        let url = self.endpoint(&format!("object/{}", self.bucket_name(bucket)));
        let response = self.authorized(self.client.delete(&url))
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("storage", response).await);
        }

        Ok(())
    }

    /// Delete an object after a failed write elsewhere; failures are only logged
    pub async fn remove_orphan(&self, bucket: Bucket, path: &str) {
        if let Err(e) = self.remove(bucket, path).await {
            warn!(bucket = self.bucket_name(bucket), path, error = %e, "Failed to remove orphaned object");
        }
    }

    /// Mint a signed download URL valid for the configured lifetime
    pub async fn signed_url(&self, bucket: Bucket, path: &str) -> Result<String> {
        let url = self.endpoint(&format!("object/sign/{}/{}", self.bucket_name(bucket), path));
        let response = self.authorized(self.client.post(&url))
            .json(&json!({ "expiresIn": self.config.signed_url_ttl_seconds }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("storage", response).await);
        }

        let signed: SignedUrlResponse = response.json().await?;
        Ok(self.absolute_url(&signed.signed_url))
    }

    /// Signed paths come back relative to the storage API root
    fn absolute_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            self.endpoint(signed)
        }
    }
}
