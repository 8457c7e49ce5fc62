//! Shared plumbing for OpenAI-compatible HTTP providers (embeddings and chat).

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

pub(crate) fn api_key_from_env() -> String {
    std::env::var(API_KEY_ENV).unwrap_or_default()
}

/// Drain a non-success response into `(status, message)`.
///
/// Prefers the provider's `{"error": {"message": ...}}` body, falling back to
/// the raw text.
pub(crate) async fn read_error(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or(body);
    (status, message)
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
