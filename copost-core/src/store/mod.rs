//! Vector store: documents, chunks and tweets with nearest-neighbour search
//!
//! `VectorStore` is the seam between the pipelines and persistence. Two
//! backends implement it:
//! - `PgVectorStore`: Postgres + pgvector, cosine distance over HNSW indexes
//! - `MemoryVectorStore`: in-process brute force, for offline runs and tests
//!
//! Both order nearest-neighbour hits by ascending cosine distance, then by
//! source kind (chunks before tweets), then by insertion order.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Chunk, DocumentSummary, NewTweet, RetrievalResult, Scope, SourceKind, Tweet};

pub mod memory;
pub mod postgres;

pub use memory::MemoryVectorStore;
pub use postgres::PgVectorStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding width mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document {0} not found")]
    DocumentNotFound(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub backend: String,
    pub server_version: Option<String>,
    pub pgvector_version: Option<String>,
    pub documents: i64,
    pub chunks: i64,
    pub tweets: i64,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create tables and indexes if missing. Safe to call concurrently.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn insert_document(
        &self,
        partner_id: &str,
        filename: &str,
        expected_chunks: i32,
    ) -> Result<i64, StoreError>;

    async fn insert_chunk(
        &self,
        document_id: i64,
        chunk_index: i32,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StoreError>;

    /// Delete a document and its chunks. Returns false when nothing matched.
    async fn delete_document(&self, document_id: i64) -> Result<bool, StoreError>;

    /// Newest first, with the count of chunks actually stored.
    async fn list_documents(&self, partner_id: &str) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Ordered by `chunk_index`.
    async fn document_chunks(&self, document_id: i64) -> Result<Vec<Chunk>, StoreError>;

    async fn tweet_exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Returns false when a tweet with the same id is already stored.
    async fn insert_tweet(&self, tweet: &NewTweet) -> Result<bool, StoreError>;

    /// Newest first.
    async fn recent_tweets(&self, partner_id: &str, limit: i64) -> Result<Vec<Tweet>, StoreError>;

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        scope: &Scope,
        limit: i64,
    ) -> Result<Vec<RetrievalResult>, StoreError>;

    async fn health(&self) -> Result<StoreHealth, StoreError>;

    /// Width of every stored embedding.
    fn dimensions(&self) -> usize;

    fn backend_name(&self) -> &str;

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), StoreError> {
        if embedding.len() != self.dimensions() {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions(),
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

/// A hit plus its insertion-order key, used only for ranking.
pub(crate) struct RankedHit {
    pub result: RetrievalResult,
    pub order: i64,
}

/// Sort hits by (distance, source kind, insertion order) and keep `limit`.
pub(crate) fn rank(mut hits: Vec<RankedHit>, limit: usize) -> Vec<RetrievalResult> {
    hits.sort_by(|a, b| {
        a.result
            .distance
            .total_cmp(&b.result.distance)
            .then_with(|| source_order(a.result.source).cmp(&source_order(b.result.source)))
            .then_with(|| a.order.cmp(&b.order))
    });
    hits.truncate(limit);
    hits.into_iter().map(|h| h.result).collect()
}

fn source_order(kind: SourceKind) -> u8 {
    match kind {
        SourceKind::Chunk => 0,
        SourceKind::Tweet => 1,
    }
}
