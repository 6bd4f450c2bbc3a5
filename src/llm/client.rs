//! Async HTTP client for the reasoning backend
//!
//! Model-agnostic chat-completions client. Supports the Anthropic messages
//! API and OpenAI-compatible servers (vLLM and friends). The client only
//! moves text; extracting a decision is the parser's job.

use crate::core::config::BackendConfig;
use crate::core::error::{Result, SimError};
use crate::llm::{DecisionRequest, ReasoningBackend, SYSTEM_PROMPT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    api_format: ApiFormat,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            api_format,
            temperature: 0.2,
            max_tokens: 256,
        }
    }

    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    /// Build a client from config. `LLM_API_URL` and `LLM_MODEL` override the
    /// configured endpoint and model; the key is read from `api_key_env`
    /// (a local vLLM server accepts any key).
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let api_url = std::env::var("LLM_API_URL")
            .ok()
            .or_else(|| config.api_url.clone())
            .ok_or_else(|| SimError::Config("no backend url configured".into()))?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| config.model.clone());
        let api_key = std::env::var(&config.api_key_env).unwrap_or_else(|_| "local".into());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SimError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            api_format: Self::detect_api_format(&api_url),
            api_key,
            api_url,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn api_format(&self) -> ApiFormat {
        self.api_format
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one completion request and return the raw response text
    pub async fn complete_text(&self, system: &str, user: &str) -> Result<String> {
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user).await,
            ApiFormat::OpenAI => self.complete_openai(system, user).await,
        }
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user.into(),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SimError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SimError::Backend(format!("API error {status}: {error_text}")));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| SimError::Backend(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| SimError::Backend("Empty response".into()))
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SimError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SimError::Backend(format!("API error {status}: {error_text}")));
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| SimError::Backend(e.to_string()))?;

        completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SimError::Backend("Empty response".into()))
    }
}

impl ReasoningBackend for LlmClient {
    async fn complete(&self, request: &DecisionRequest) -> Result<String> {
        self.complete_text(SYSTEM_PROMPT, &request.prompt).await
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format (vLLM, OpenAI, etc.)
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// Shared
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}
