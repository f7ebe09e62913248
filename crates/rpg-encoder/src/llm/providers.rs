//! Concrete LLM providers: Anthropic and OpenAI-compatible chat APIs.

use super::LlmClient;
use async_trait::async_trait;
use rpg_core::error::{Result, RpgError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

async fn with_deadline<F>(deadline: Duration, fut: F) -> Result<String>
where
    F: std::future::Future<Output = Result<String>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| RpgError::Llm(format!("deadline of {}s exceeded", deadline.as_secs())))?
}

/// Anthropic messages API client.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(max_tokens: u32) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| RpgError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        let model = std::env::var("RPG_LLM_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        Ok(Self::new(api_key, model, max_tokens))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str, deadline: Duration) -> Result<String> {
        let req = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        with_deadline(deadline, async {
            let resp = self
                .http
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&req)
                .send()
                .await
                .map_err(|e| RpgError::Llm(format!("anthropic transport: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(RpgError::Llm(format!("anthropic returned {status}: {text}")));
            }

            let body: AnthropicResponse = resp
                .json()
                .await
                .map_err(|e| RpgError::Llm(format!("anthropic response: {e}")))?;
            body.content
                .first()
                .map(|c| c.text.clone())
                .ok_or_else(|| RpgError::Llm("empty anthropic response".to_string()))
        })
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(max_tokens: u32) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RpgError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("RPG_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Ok(Self::new(base_url, api_key, model, max_tokens))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, user: &str, deadline: Duration) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let req = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            // Deterministic output for structured extraction.
            temperature: Some(0.0),
        };

        with_deadline(deadline, async {
            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("content-type", "application/json")
                .json(&req)
                .send()
                .await
                .map_err(|e| RpgError::Llm(format!("chat transport ({url}): {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(RpgError::Llm(format!("chat API returned {status}: {text}")));
            }

            let body: OpenAiResponse = resp
                .json()
                .await
                .map_err(|e| RpgError::Llm(format!("chat response: {e}")))?;
            body.choices
                .first()
                .map(|c| c.message.content.clone())
                .ok_or_else(|| RpgError::Llm("empty chat response".to_string()))
        })
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
