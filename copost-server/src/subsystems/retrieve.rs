//! Retrieval subsystem: partner-scoped similarity search
//!
//! Embeds the query once and asks the vector store for the nearest chunks
//! and/or tweets of one partner. Results come back in ascending cosine
//! distance and keep their distance.

use copost_core::config::RetrievalConfig;
use copost_core::embeddings::{EmbeddingBackend, EmbeddingError};
use copost_core::models::{RetrievalResult, Scope, Sources};
use copost_core::store::{StoreError, VectorStore};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector search failed: {0}")]
    Store(#[from] StoreError),
}

impl RetrievalError {
    /// Error class reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::EmptyQuery => "validation",
            RetrievalError::Embedding(_) => "provider",
            RetrievalError::Store(_) => "internal",
        }
    }
}

/// Search response data structure
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievalResult>,
    pub query: String,
    pub partner_id: String,
    pub count: usize,
}

/// Clamp a requested limit into `[1, max_limit]`, using the default when absent.
pub fn clamp_limit(limit: Option<u32>, config: &RetrievalConfig) -> i64 {
    let max = config.max_limit.max(1);
    i64::from(limit.unwrap_or(config.default_limit).clamp(1, max))
}

/// Nearest neighbours of `query` within one partner's rows.
///
/// An unknown or empty partner id yields an empty result, not an error.
pub async fn retrieve(
    embedder: &dyn EmbeddingBackend,
    store: &dyn VectorStore,
    config: &RetrievalConfig,
    query: &str,
    partner_id: &str,
    limit: Option<u32>,
    sources: Sources,
) -> Result<Vec<RetrievalResult>, RetrievalError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(RetrievalError::EmptyQuery);
    }

    let limit = clamp_limit(limit, config);
    let embedding = embedder.embed(query).await?;

    let scope = Scope::documents(partner_id).with_sources(sources);
    let results = store.nearest_neighbors(&embedding, &scope, limit).await?;

    tracing::debug!(
        partner_id = partner_id,
        limit = limit,
        hits = results.len(),
        "Retrieval complete"
    );

    Ok(results)
}

/// `retrieve` wrapped in the search response shape.
pub async fn search(
    embedder: &dyn EmbeddingBackend,
    store: &dyn VectorStore,
    config: &RetrievalConfig,
    query: &str,
    partner_id: &str,
    limit: Option<u32>,
    sources: Sources,
) -> Result<SearchResponse, RetrievalError> {
    let results = retrieve(embedder, store, config, query, partner_id, limit, sources).await?;
    Ok(SearchResponse {
        count: results.len(),
        results,
        query: query.trim().to_string(),
        partner_id: partner_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use copost_core::store::MemoryVectorStore;

    struct AxisEmbedder;

    /// "a…" points along x, everything else along y.
    #[async_trait]
    impl EmbeddingBackend for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.starts_with('a') {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    async fn seeded_store() -> MemoryVectorStore {
        let store = MemoryVectorStore::new(2);
        let doc = store.insert_document("acme", "a.md", 3).await.unwrap();
        store.insert_chunk(doc, 0, "alpha", &[1.0, 0.0]).await.unwrap();
        store.insert_chunk(doc, 1, "mixed", &[1.0, 1.0]).await.unwrap();
        store.insert_chunk(doc, 2, "beta", &[0.0, 1.0]).await.unwrap();

        let other = store.insert_document("globex", "g.md", 1).await.unwrap();
        store.insert_chunk(other, 0, "alpha twin", &[1.0, 0.0]).await.unwrap();
        store
    }

    #[test]
    fn test_clamp_limit() {
        let config = RetrievalConfig::default();
        assert_eq!(clamp_limit(None, &config), 5);
        assert_eq!(clamp_limit(Some(0), &config), 1);
        assert_eq!(clamp_limit(Some(7), &config), 7);
        assert_eq!(clamp_limit(Some(500), &config), 20);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let store = seeded_store().await;
        let err = retrieve(
            &AxisEmbedder,
            &store,
            &RetrievalConfig::default(),
            "   ",
            "acme",
            None,
            Sources::Documents,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyQuery));
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_results_are_scoped_and_ordered() {
        let store = seeded_store().await;
        let results = retrieve(
            &AxisEmbedder,
            &store,
            &RetrievalConfig::default(),
            "another query",
            "acme",
            Some(10),
            Sources::Documents,
        )
        .await
        .unwrap();

        let contents: Vec<_> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "mixed", "beta"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(results.iter().all(|r| r.label == "a.md"));
    }

    #[tokio::test]
    async fn test_unknown_partner_yields_empty() {
        let store = seeded_store().await;
        let response = search(
            &AxisEmbedder,
            &store,
            &RetrievalConfig::default(),
            "alpha",
            "nobody",
            None,
            Sources::All,
        )
        .await
        .unwrap();
        assert_eq!(response.count, 0);
        assert!(response.results.is_empty());
    }
}
