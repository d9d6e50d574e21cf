//! Router tests that need no database
//!
//! Requests go through the full axum stack with `oneshot`; providers are
//! wiremock servers.

mod helpers;

use std::net::SocketAddr;
use axum::extract::ConnectInfo;
use serde_json::{json, Value};
use helpers::*;

#[tokio::test]
async fn test_protected_routes_require_bearer() {
    let ctx = TestContext::without_database().await;

    for (method, uri) in [
        ("GET", "/api/me"),
        ("GET", "/api/cases"),
        ("GET", "/api/invoices"),
        ("GET", "/api/admin/users"),
        ("POST", "/api/auth/logout"),
    ] {
        let (status, body) = ctx.send(json_request(method, uri, None, None)).await;
        assert_eq!(status, 401, "{} {} should need a token", method, uri);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx.send(json_request("GET", "/api/me", Some("not-a-jwt"), None)).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn test_wrong_verb_gets_405() {
    let ctx = TestContext::without_database().await;

    let (status, _) = ctx.send(json_request("DELETE", "/api/cases", None, None)).await;
    assert_eq!(status, 405);
    let (status, _) = ctx.send(json_request("GET", "/api/webhooks/stripe", None, None)).await;
    assert_eq!(status, 405);
}

#[tokio::test]
async fn test_ai_chat_truncates_and_keeps_recent_history() {
    let ctx = TestContext::without_database().await;

    let mut messages: Vec<Value> = (0..24)
        .map(|i| json!({
            "role": if i % 2 == 0 { "user" } else { "assistant" },
            "content": format!("message {}", i),
        }))
        .collect();
    messages.push(json!({ "role": "user", "content": "x".repeat(5000) }));

    ctx.mocks.mock_chat_completion(
        |body| {
            let sent = body["messages"].as_array().cloned().unwrap_or_default();
            sent.len() == 21
                && sent[0]["role"] == "system"
                && sent[1]["content"] == "message 5"
                && sent.iter().all(|m| m["content"].as_str().map_or(false, |c| c.chars().count() <= 4000))
                && sent[20]["content"].as_str().map_or(false, |c| c.chars().count() == 4000)
        },
        "You will need a valid passport.",
        1,
    ).await;

    let (status, body) = ctx.send(json_request("POST", "/api/ai-chat", None, Some(json!({ "messages": messages })))).await;
    assert_eq!(status, 200, "unexpected body {}", body);
    assert_eq!(body["message"], "You will need a valid passport.");
}

#[tokio::test]
async fn test_ai_chat_requires_messages() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx.send(json_request("POST", "/api/ai-chat", None, Some(json!({ "messages": [] })))).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_contact_validates_then_sends() {
    let ctx = TestContext::without_database().await;
    ctx.mocks.mock_email_accepted(1).await;

    let invalid = json!({ "name": "Ana", "email": "not-an-email", "message": "Hello" });
    let (status, _) = ctx.send(json_request("POST", "/api/contact", None, Some(invalid))).await;
    assert_eq!(status, 400);

    let valid = json!({ "name": "Ana", "email": "ana@example.com", "phone": "+1 555 0100", "message": "Hello" });
    let (status, body) = ctx.send(json_request("POST", "/api/contact", None, Some(valid))).await;
    assert_eq!(status, 200, "unexpected body {}", body);
    assert_eq!(body["status"], "sent");
}

#[tokio::test]
async fn test_contact_is_rate_limited() {
    let ctx = TestContext::without_database_with(|settings| {
        settings.rate_limit.max_requests = 2;
        settings.rate_limit.burst_allowance = 0;
    }).await;

    let body = json!({ "name": "", "email": "", "message": "" });
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let (status, _) = ctx.send(json_request("POST", "/api/contact", None, Some(body.clone()))).await;
        statuses.push(status);
    }

    assert_eq!(statuses, vec![400, 400, 429]);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_limit() {
    let ctx = TestContext::without_database_with(|settings| {
        settings.rate_limit.max_requests = 2;
        settings.rate_limit.burst_allowance = 0;
    }).await;

    let body = json!({ "name": "", "email": "", "message": "" });
    let mut statuses = Vec::new();
    for i in 0..3 {
        let mut request = json_request("POST", "/api/contact", None, Some(body.clone()));
        request.headers_mut().insert("x-forwarded-for", format!("10.0.0.{}", i).parse().unwrap());
        request.headers_mut().insert("x-real-ip", format!("10.0.1.{}", i).parse().unwrap());
        let (status, _) = ctx.send(request).await;
        statuses.push(status);
    }

    assert_eq!(statuses, vec![400, 400, 429]);
}

#[tokio::test]
async fn test_trusted_proxy_limits_each_forwarded_client() {
    let ctx = TestContext::without_database_with(|settings| {
        settings.rate_limit.max_requests = 1;
        settings.rate_limit.burst_allowance = 0;
        settings.rate_limit.trusted_proxies = vec!["10.0.0.2".to_string()];
    }).await;

    let from = |peer: &str, client: &str| {
        let mut request = json_request("POST", "/api/contact", None, Some(json!({ "name": "", "email": "", "message": "" })));
        request.headers_mut().insert("x-forwarded-for", client.parse().unwrap());
        request.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        request
    };

    let (first, _) = ctx.send(from("10.0.0.2:443", "198.51.100.1")).await;
    let (second_client, _) = ctx.send(from("10.0.0.2:443", "198.51.100.2")).await;
    let (repeat, _) = ctx.send(from("10.0.0.2:443", "198.51.100.1")).await;
    assert_eq!((first, second_client, repeat), (400, 400, 429));

    // An untrusted peer is charged for itself whatever it forwards
    let (direct, _) = ctx.send(from("203.0.113.9:5000", "198.51.100.3")).await;
    let (spoofed, _) = ctx.send(from("203.0.113.9:5000", "198.51.100.4")).await;
    assert_eq!((direct, spoofed), (400, 429));
}

#[tokio::test]
async fn test_sitemap_lists_visa_programs() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx.send(json_request("GET", "/api/sitemap.xml", None, None)).await;
    assert_eq!(status, 200);

    let xml = body.as_str().expect("sitemap is not JSON");
    assert!(xml.contains("<urlset"));
    assert!(xml.contains("https://portal.example.com/pricing"));
    for program in &ctx.services.catalogue.programs {
        assert!(xml.contains(&format!("/visas/{}", program.code)));
    }
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let ctx = TestContext::without_database().await;
    let payload = checkout_completed_event("evt_bad", json!({}));

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("stripe-signature", format!("t={},v1=deadbeef", chrono::Utc::now().timestamp()))
        .body(axum::body::Body::from(payload.clone()))
        .unwrap();
    let (status, body) = ctx.send(request).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid webhook signature");

    let unsigned = axum::http::Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .body(axum::body::Body::from(payload))
        .unwrap();
    let (status, _) = ctx.send(unsigned).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_webhook_with_extreme_timestamp_is_bad_request() {
    let ctx = TestContext::without_database().await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("stripe-signature", "t=-9223372036854775000,v1=deadbeef")
        .body(axum::body::Body::from(checkout_completed_event("evt_old", json!({}))))
        .unwrap();
    let (status, body) = ctx.send(request).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Webhook signature timestamp outside tolerance");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let ctx = TestContext::without_database().await;

    let request = axum::http::Request::builder()
        .uri("/api/sitemap.xml")
        .header("x-request-id", "trace-42")
        .body(axum::body::Body::empty())
        .unwrap();

    use tower::ServiceExt;
    let response = ctx.app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");
}
