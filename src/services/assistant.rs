//! AI assistant proxy
//!
//! Stateless forwarder to an LLM provider. Only the trimmed history sent by
//! the browser is forwarded; nothing is stored.

use std::time::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use crate::config::settings::AssistantConfig;
use crate::models::VisaCatalogue;
use crate::services::provider_error;
use crate::utils::errors::{VisaPilotError, Result};
use crate::utils::helpers::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn parse(role: &str) -> Option<Self> {
        match role {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// Message as received from the browser; roles are not trusted
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Which provider answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

/// Keep the most recent `max_history` messages with an accepted role,
/// each cut to `max_chars` characters. Blank messages are dropped.
pub fn prepare_history(messages: &[IncomingMessage], max_history: usize, max_chars: usize) -> Vec<ChatMessage> {
    let accepted: Vec<ChatMessage> = messages
        .iter()
        .filter_map(|message| {
            let role = ChatRole::parse(message.role.trim())?;
            if message.content.trim().is_empty() {
                return None;
            }
            Some(ChatMessage { role, content: truncate_chars(&message.content, max_chars) })
        })
        .collect();

    let skip = accepted.len().saturating_sub(max_history);
    accepted.into_iter().skip(skip).collect()
}

/// Fixed system prompt listing the supported programs
pub fn system_prompt(catalogue: &VisaCatalogue) -> String {
    let mut prompt = String::from(
        "You are the virtual assistant of an immigration services firm. Answer questions about \
         visa programs, required documents and the application process in a friendly, concise way. \
         You do not give legal advice; suggest booking a consultation for case-specific questions.\n\n\
         Programs we support:\n",
    );

    for program in &catalogue.programs {
        prompt.push_str(&format!("- {}: {}\n", program.name, program.summary));
    }

    prompt
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Clone)]
#[derive(Debug)]
pub struct AssistantService {
    client: Client,
    config: AssistantConfig,
    system_prompt: String,
}

impl AssistantService {
    pub fn new(config: AssistantConfig, catalogue: &VisaCatalogue) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("VisaPilot/1.0")
            .build()?;

        Ok(Self { client, system_prompt: system_prompt(catalogue), config })
    }

    /// Provider used for the next request; OpenAI when its key is set
    pub fn provider(&self) -> Option<Provider> {
        let configured = |key: &Option<String>| key.as_deref().is_some_and(|key| !key.is_empty());
        if configured(&self.config.openai_api_key) {
            Some(Provider::OpenAi)
        } else if configured(&self.config.anthropic_api_key) {
            Some(Provider::Anthropic)
        } else {
            None
        }
    }

    /// Answer the latest user message given the conversation so far
    pub async fn reply(&self, messages: &[IncomingMessage]) -> Result<String> {
        let history = prepare_history(messages, self.config.max_history, self.config.max_message_chars);
        if history.is_empty() {
            return Err(VisaPilotError::InvalidInput("At least one message is required".to_string()));
        }

        let provider = self.provider()
            .ok_or_else(|| VisaPilotError::ServiceUnavailable("Assistant is not configured".to_string()))?;
        debug!(provider = ?provider, messages = history.len(), "Forwarding chat");

        let reply = match provider {
            Provider::OpenAi => self.openai(&history).await?,
            Provider::Anthropic => self.anthropic(&history).await?,
        };

        if reply.trim().is_empty() {
            warn!(provider = ?provider, "Assistant returned an empty reply");
            return Err(VisaPilotError::ServiceUnavailable("Assistant returned no answer".to_string()));
        }

        Ok(reply)
    }

    async fn openai(&self, history: &[ChatMessage]) -> Result<String> {
        let mut messages = vec![json!({ "role": "system", "content": self.system_prompt })];
        messages.extend(history.iter().map(|message| json!(message)));

        let response = self.client
            .post(format!("{}/chat/completions", self.config.openai_url.trim_end_matches('/')))
            .bearer_auth(self.config.openai_api_key.as_deref().unwrap_or_default())
            .json(&json!({
                "model": self.config.openai_model,
                "messages": messages,
                "max_tokens": self.config.max_output_tokens,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("openai", response).await);
        }

        let body: OpenAiResponse = response.json().await?;
        Ok(body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    async fn anthropic(&self, history: &[ChatMessage]) -> Result<String> {
        // The messages API requires the conversation to open with a user turn
        let messages: Vec<&ChatMessage> = history
            .iter()
            .skip_while(|message| message.role != ChatRole::User)
            .collect();

        let response = self.client
            .post(format!("{}/messages", self.config.anthropic_url.trim_end_matches('/')))
            .header("x-api-key", self.config.anthropic_api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.config.anthropic_model,
                "max_tokens": self.config.max_output_tokens,
                "system": self.system_prompt,
                "messages": messages,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("anthropic", response).await);
        }

        let body: AnthropicResponse = response.json().await?;
        Ok(body.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}
