//! Chat completion client for an OpenAI-compatible `/chat/completions` API.
//!
//! One system message plus one user message per call. JSON mode asks the
//! provider for a JSON object; the caller still validates what comes back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatSettings;
use crate::openai;

// ============================================================================
// Request / trait
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens,
            json_mode: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the text of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;

    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat request timed out")]
    Timeout,

    #[error("Rate limited by chat provider: {message}")]
    RateLimited { message: String },

    #[error("Chat provider rejected the credential ({code}): {message}")]
    Unauthorized { code: u16, message: String },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Chat response had no content")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

impl ChatError {
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::Timeout | ChatError::RateLimited { .. } => true,
            ChatError::Api { code, .. } => *code >= 500,
            ChatError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

// ============================================================================
// OpenAI wire types (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ============================================================================
// OpenAiChatClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ChatClientConfig {
    pub fn from_settings(settings: &ChatSettings) -> Self {
        Self {
            api_key: openai::api_key_from_env(),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: Client,
    config: ChatClientConfig,
    base_url: String,
}

impl OpenAiChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, ChatError> {
        Self::with_base_url(config, openai::DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(config: ChatClientConfig, base_url: String) -> Result<Self, ChatError> {
        if config.api_key.is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        let client = openai::build_client(config.timeout)?;
        Ok(Self {
            client,
            config,
            base_url: openai::trim_base_url(&base_url),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Timeout
                } else {
                    ChatError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let (code, message) = openai::read_error(response).await;
            tracing::error!(code = code, message = %message, "Chat API error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimited { message },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ChatError::Unauthorized { code, message }
                }
                _ => ChatError::Api { code, message },
            });
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|_| ChatError::EmptyResponse)?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ChatError::EmptyResponse)?;

        tracing::debug!(
            chars = content.len(),
            json_mode = request.json_mode,
            "Chat completion received"
        );

        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
