//! Provider construction: the one place clients are built and wrapped
//!
//! Both providers read the credential from `OPENAI_API_KEY` and are wrapped in
//! the configured retry policy. Nothing downstream retries on its own.

use std::sync::Arc;

use copost_core::chat::{ChatBackend, ChatClientConfig, ChatError, OpenAiChatClient};
use copost_core::embeddings::{
    EmbeddingBackend, EmbeddingConfig, EmbeddingError, OpenAiEmbeddingClient,
};
use copost_core::retry::{RetryPolicy, RetryingChat, RetryingEmbedder};
use copost_core::CopostConfig;

/// Build the embedding backend from `[embedding]` and `[retry]`.
pub fn create_embedder(config: &CopostConfig) -> Result<Arc<dyn EmbeddingBackend>, EmbeddingError> {
    let client = OpenAiEmbeddingClient::with_base_url(
        EmbeddingConfig::from_settings(&config.embedding),
        config.embedding.base_url.clone(),
    )?;
    Ok(wrap_embedder(Arc::new(client), RetryPolicy::from(&config.retry)))
}

/// Build the chat backend from `[chat]` and `[retry]`.
pub fn create_chat(config: &CopostConfig) -> Result<Arc<dyn ChatBackend>, ChatError> {
    let client = OpenAiChatClient::with_base_url(
        ChatClientConfig::from_settings(&config.chat),
        config.chat.base_url.clone(),
    )?;
    Ok(wrap_chat(Arc::new(client), RetryPolicy::from(&config.retry)))
}

pub fn wrap_embedder(
    inner: Arc<dyn EmbeddingBackend>,
    policy: RetryPolicy,
) -> Arc<dyn EmbeddingBackend> {
    tracing::info!(
        backend = inner.name(),
        dimensions = inner.dimensions(),
        max_retries = policy.max_retries,
        "Embedding backend ready"
    );
    Arc::new(RetryingEmbedder::new(inner, policy))
}

pub fn wrap_chat(inner: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Arc<dyn ChatBackend> {
    tracing::info!(
        backend = inner.name(),
        max_retries = policy.max_retries,
        "Chat backend ready"
    );
    Arc::new(RetryingChat::new(inner, policy))
}
