//! Mistral chat-completion client for JSON-mode extraction.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Low temperature keeps the model close to the OCR text.
pub const TEMPERATURE: f32 = 0.2;

/// A chat model that answers with a JSON object.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    /// Send `messages` and return the raw content of the first choice.
    async fn complete_json(&self, messages: Vec<Message>) -> Result<String>;
}

#[derive(Clone)]
pub struct MistralChatClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl MistralChatClient {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into(),
            model: model.into(),
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for MistralChatClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, messages: Vec<Message>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            response_format: ResponseFormat::JsonObject,
            temperature: TEMPERATURE,
        };

        debug!("Sending request to Mistral chat: model={}", request.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Mistral chat")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Mistral chat API error ({}): {}", status, error_text);
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse Mistral chat response")?;

        if let Some(usage) = &response.usage {
            info!(
                "Mistral chat response: {} tokens (prompt: {}, completion: {})",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Mistral chat response contained no message content")?;

        debug!(
            "Raw completion ({} chars): {}",
            content.len(),
            content.chars().take(500).collect::<String>()
        );
        Ok(content)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
}

impl Message {
    /// A user turn made of a single text part.
    pub fn user_text_part(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Concatenated text of every part.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|ContentPart::Text { text }| text.as_str())
            .collect()
    }
}
