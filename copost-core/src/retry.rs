//! Retry wrappers for provider backends.
//!
//! Clients never retry on their own. A `RetryingEmbedder` or `RetryingChat`
//! wraps a backend and retries only errors whose `is_transient()` is true,
//! with exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::chat::{ChatBackend, ChatError, ChatRequest};
use crate::config::RetryConfig;
use crate::embeddings::{EmbeddingBackend, EmbeddingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delays of base, 2*base, 4*base ... capped at `max_delay_ms`, jittered.
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor((self.base_delay_ms / 2).max(1))
            .max_delay(Duration::from_millis(self.max_delay_ms.max(1)))
            .map(jitter)
            .take(self.max_retries)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

// ============================================================================
// Embeddings
// ============================================================================

pub struct RetryingEmbedder {
    inner: Arc<dyn EmbeddingBackend>,
    policy: RetryPolicy,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl EmbeddingBackend for RetryingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let result = RetryIf::spawn(
            self.policy.strategy(),
            || self.inner.embed(text),
            |e: &EmbeddingError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(backend = self.inner.name(), error = %e, "Retrying embedding call");
                }
                retry
            },
        )
        .await;

        if let Err(e) = &result {
            tracing::error!(backend = self.inner.name(), error = %e, "Embedding call failed");
        }
        result
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ============================================================================
// Chat
// ============================================================================

pub struct RetryingChat {
    inner: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
}

impl RetryingChat {
    pub fn new(inner: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ChatBackend for RetryingChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        RetryIf::spawn(
            self.policy.strategy(),
            || self.inner.complete(request),
            |e: &ChatError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(backend = self.inner.name(), error = %e, "Retrying chat call");
                }
                retry
            },
        )
        .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
