//! Unauthenticated routes: assistant, contact form and sitemap

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use crate::models::VisaCatalogue;
use crate::services::assistant::IncomingMessage;
use crate::services::email::ContactRequest;
use crate::state::AppState;
use crate::utils::errors::Result;

/// Marketing pages listed in the sitemap, with change frequency and priority
pub const PUBLIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "weekly", "1.0"),
    ("/about", "monthly", "0.8"),
    ("/services", "monthly", "0.9"),
    ("/pricing", "monthly", "0.9"),
    ("/visas", "weekly", "0.9"),
    ("/contact", "yearly", "0.7"),
    ("/login", "yearly", "0.3"),
    ("/signup", "yearly", "0.5"),
];

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: String,
}

pub async fn handle_ai_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>> {
    let message = state.services.assistant.reply(&request.messages).await?;
    Ok(Json(ChatReply { message }))
}

pub async fn handle_contact(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<Json<Value>> {
    let request = request.validated()?;
    state.services.email.send_contact(&request).await?;

    info!(email = %request.email, "Contact request forwarded");
    Ok(Json(json!({ "status": "sent" })))
}

pub async fn handle_sitemap(State(state): State<AppState>) -> impl IntoResponse {
    let xml = render_sitemap(&state.services.settings.server.public_base_url, &state.services.catalogue);
    ([(CONTENT_TYPE, "application/xml; charset=utf-8")], xml)
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Public pages plus one page per visa program
pub fn render_sitemap(base_url: &str, catalogue: &VisaCatalogue) -> String {
    let base = base_url.trim_end_matches('/');
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

    let mut push = |path: &str, changefreq: &str, priority: &str| {
        xml.push_str(&format!(
            "  <url><loc>{}</loc><changefreq>{}</changefreq><priority>{}</priority></url>\n",
            escape_xml(&format!("{}{}", base, path)),
            changefreq,
            priority
        ));
    };

    for (path, changefreq, priority) in PUBLIC_PAGES {
        push(path, changefreq, priority);
    }
    for program in &catalogue.programs {
        push(&format!("/visas/{}", urlencoding::encode(&program.code)), "monthly", "0.8");
    }

    xml.push_str("</urlset>\n");
    xml
}
