//! Embeddings module: text-to-vector calls against an OpenAI-compatible API
//!
//! Provides the `EmbeddingBackend` trait and `OpenAiEmbeddingClient`.
//! Every call is a fresh request: no caching and no retries here. Retrying
//! transient failures is the job of `crate::retry`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmbeddingSettings;
use crate::openai;

/// Width of `text-embedding-3-small` vectors and of the store's vector columns.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text into a vector of exactly `dimensions()` floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension (e.g., 1536).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding request timed out")]
    Timeout,

    #[error("Rate limited by embedding provider: {message}")]
    RateLimited { message: String },

    #[error("Embedding provider rejected the credential ({code}): {message}")]
    Unauthorized { code: u16, message: String },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,
}

impl EmbeddingError {
    /// Rate limits, provider 5xx, timeouts and connection failures may succeed
    /// on a later attempt. Credential, dimension and payload errors will not.
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Timeout | EmbeddingError::RateLimited { .. } => true,
            EmbeddingError::Api { code, .. } => *code >= 500,
            EmbeddingError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EmbeddingError::Timeout
        } else {
            EmbeddingError::Http(e)
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

/// Embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout: Duration,
}

impl EmbeddingConfig {
    pub fn new(api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let api_key = api_key.unwrap_or_else(openai::api_key_from_env);

        Self {
            api_key,
            model,
            dimensions,
            timeout: Duration::from_secs(30),
        }
    }

    /// Build from the `[embedding]` config section; the key comes from the environment.
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        let mut config = Self::new(None, settings.model.clone(), settings.dimensions);
        config.timeout = Duration::from_secs(settings.timeout_seconds);
        config
    }
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Option<Vec<f32>>,
}

// ============================================================================
// OpenAiEmbeddingClient
// ============================================================================

/// Embedding client for `POST {base_url}/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
    base_url: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(config, openai::DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / compatible providers)
    pub fn with_base_url(
        config: EmbeddingConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = openai::build_client(config.timeout)?;

        Ok(Self {
            client,
            config,
            base_url: openai::trim_base_url(&base_url),
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(EmbeddingError::from_send)?;

        let status = response.status();

        if !status.is_success() {
            let (code, message) = openai::read_error(response).await;
            tracing::error!(code = code, message = %message, "Embedding API error");

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimited { message },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    EmbeddingError::Unauthorized { code, message }
                }
                _ => EmbeddingError::Api { code, message },
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|_| EmbeddingError::MissingEmbedding)?;

        let values = body
            .data
            .into_iter()
            .next()
            .and_then(|d| d.embedding)
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_once(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: api_key.to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
            timeout: Duration::from_secs(5),
        }
    }

    fn mock_embedding_response() -> serde_json::Value {
        let values: Vec<f32> = (0..EMBEDDING_DIMENSIONS)
            .map(|i| (i as f32) / EMBEDDING_DIMENSIONS as f32)
            .collect();
        serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": values }],
            "model": "text-embedding-3-small"
        })
    }

    async fn client_for(mock_server: &MockServer) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client")
    }

    #[tokio::test]
    async fn test_embed_calls_api_and_returns_full_width_vector() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "hello world",
                "encoding_format": "float"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let embedding = client.embed("hello world").await.expect("embed should succeed");
        assert_eq!(embedding.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(client.name(), "openai");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient_and_not_retried_here() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit reached", "type": "requests" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client.embed("hello").await.unwrap_err();
        match &err {
            EmbeddingError::RateLimited { message } => assert_eq!(message, "Rate limit reached"),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let err = client.embed("hello").await.unwrap_err();
        match &err {
            EmbeddingError::Api { code, message } => {
                assert_eq!(*code, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_credential_is_not_transient() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&mock_server)
            .await;

        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unauthorized { code: 401, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_vector_field_is_reported() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })),
            )
            .mount(&mock_server)
            .await;

        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingEmbedding));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_wrong_dimensions_are_rejected() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3] }]
            })))
            .mount(&mock_server)
            .await;

        match client.embed("hello").await {
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, EMBEDDING_DIMENSIONS);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_api_key_fails_construction() {
        let result = OpenAiEmbeddingClient::new(test_config(""));
        assert!(matches!(result, Err(EmbeddingError::MissingApiKey)));
    }
}
