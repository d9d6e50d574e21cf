//! Mock hosted providers for testing
//!
//! One wiremock server per provider so expectations never interfere.

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Mock identity, storage, payments, LLM and e-mail APIs
pub struct ProviderMocks {
    pub identity: MockServer,
    pub storage: MockServer,
    pub payments: MockServer,
    pub llm: MockServer,
    pub email: MockServer,
}

impl ProviderMocks {
    pub async fn start() -> Self {
        Self {
            identity: MockServer::start().await,
            storage: MockServer::start().await,
            payments: MockServer::start().await,
            llm: MockServer::start().await,
            email: MockServer::start().await,
        }
    }

    /// Checkout session creation answering with a fixed session
    pub async fn mock_checkout_session(&self, session_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": session_id,
                "url": format!("https://checkout.example.com/pay/{}", session_id),
            })))
            .mount(&self.payments)
            .await;
    }

    /// Signed URL minting for any object
    pub async fn mock_signed_url(&self) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/storage/v1/object/sign/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signedURL": "/object/sign/invoices/file.pdf?token=signed",
            })))
            .mount(&self.storage)
            .await;
    }

    /// Object uploads into a bucket
    pub async fn mock_object_upload(&self, bucket: &str) {
        Mock::given(method("POST"))
            .and(path_regex(format!(r"^/storage/v1/object/{}/.+$", bucket)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": bucket })))
            .mount(&self.storage)
            .await;
    }

    /// Object deletion from a bucket, called exactly `expected_calls` times
    pub async fn mock_object_removal(&self, bucket: &str, expected_calls: u64) {
        Mock::given(method("DELETE"))
            .and(path(format!("/storage/v1/object/{}", bucket)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(expected_calls)
            .mount(&self.storage)
            .await;
    }

    /// Storage requests seen so far with the given method
    pub async fn storage_requests(&self, http_method: &str) -> Vec<Request> {
        self.storage
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == http_method)
            .collect()
    }

    /// Password grant for `email` answering with a session for `user_id`
    pub async fn mock_password_grant(&self, user_id: uuid::Uuid, email: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(body_partial_json(json!({ "email": email })))
            .respond_with(ResponseTemplate::new(200).set_body_json(identity_session(user_id, email, access_token)))
            .mount(&self.identity)
            .await;
    }

    /// Session revocation that must carry `access_token`
    pub async fn mock_sign_out(&self, access_token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", format!("Bearer {}", access_token).as_str()))
            .respond_with(ResponseTemplate::new(204))
            .expect(expected_calls)
            .mount(&self.identity)
            .await;
    }

    /// Role mirroring through the admin users endpoint
    pub async fn mock_admin_set_role(&self, user_id: uuid::Uuid, role: &str) {
        Mock::given(method("PUT"))
            .and(path(format!("/auth/v1/admin/users/{}", user_id)))
            .and(header("authorization", "Bearer service-role-key"))
            .and(body_partial_json(json!({ "app_metadata": { "role": role } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user_id })))
            .expect(1)
            .mount(&self.identity)
            .await;
    }

    /// Chat completion answering with `reply`, for requests accepted by `matcher`
    pub async fn mock_chat_completion<M>(&self, matcher: M, reply: &str, expected_calls: u64)
    where
        M: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(move |request: &Request| {
                request.body_json::<Value>().map(|body| matcher(&body)).unwrap_or(false)
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            })))
            .expect(expected_calls)
            .mount(&self.llm)
            .await;
    }

    pub async fn mock_email_accepted(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
            .expect(expected_calls)
            .mount(&self.email)
            .await;
    }
}

/// `t=...,v1=...` header for a payload, signed now
pub fn sign_webhook(payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("HMAC accepts any key");
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Session body as the identity provider returns it
pub fn identity_session(user_id: uuid::Uuid, email: &str, access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": user_id, "email": email, "user_metadata": {}, "app_metadata": {} },
    })
}

/// Completed checkout event pointing at rows through its metadata
pub fn checkout_completed_event(event_id: &str, metadata: Value) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_intent": "pi_test_1",
                "metadata": metadata,
            }
        }
    })
    .to_string()
}
