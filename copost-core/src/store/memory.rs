//! In-process vector store. Brute-force cosine distance over every row in scope.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use tokio::sync::RwLock;

use super::{rank, RankedHit, StoreError, StoreHealth, VectorStore};
use crate::models::tweet::tweet_label;
use crate::models::{
    Chunk, Document, DocumentSummary, NewTweet, RetrievalResult, Scope, SourceKind, Tweet,
};

struct StoredChunk {
    document_id: i64,
    chunk_index: i32,
    content: String,
    embedding: Vec<f32>,
}

struct StoredTweet {
    seq: i64,
    tweet: Tweet,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<i64, Document>,
    chunks: BTreeMap<i64, StoredChunk>,
    tweets: HashMap<String, StoredTweet>,
    next_document_id: i64,
    next_chunk_id: i64,
    next_tweet_seq: i64,
}

pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
    dimensions: usize,
}

impl MemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dimensions,
        }
    }
}

/// `1 - cos(a, b)`, matching pgvector's `<=>`. Zero vectors are maximally far.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_document(
        &self,
        partner_id: &str,
        filename: &str,
        expected_chunks: i32,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_document_id += 1;
        let id = inner.next_document_id;
        inner.documents.insert(
            id,
            Document {
                id,
                partner_id: partner_id.to_string(),
                filename: filename.to_string(),
                expected_chunks,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn insert_chunk(
        &self,
        document_id: i64,
        chunk_index: i32,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StoreError> {
        self.check_dimensions(embedding)?;
        let mut inner = self.inner.write().await;
        if !inner.documents.contains_key(&document_id) {
            return Err(StoreError::DocumentNotFound(document_id));
        }
        inner.next_chunk_id += 1;
        let id = inner.next_chunk_id;
        inner.chunks.insert(
            id,
            StoredChunk {
                document_id,
                chunk_index,
                content: content.to_string(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(id)
    }

    async fn delete_document(&self, document_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.documents.remove(&document_id).is_none() {
            return Ok(false);
        }
        inner.chunks.retain(|_, c| c.document_id != document_id);
        Ok(true)
    }

    async fn list_documents(&self, partner_id: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let inner = self.inner.read().await;
        let mut out: Vec<DocumentSummary> = inner
            .documents
            .values()
            .filter(|d| d.partner_id == partner_id)
            .map(|d| DocumentSummary {
                id: d.id,
                partner_id: d.partner_id.clone(),
                filename: d.filename.clone(),
                expected_chunks: d.expected_chunks,
                stored_chunks: inner
                    .chunks
                    .values()
                    .filter(|c| c.document_id == d.id)
                    .count() as i64,
                created_at: d.created_at,
            })
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn document_chunks(&self, document_id: i64) -> Result<Vec<Chunk>, StoreError> {
        let inner = self.inner.read().await;
        let mut out: Vec<Chunk> = inner
            .chunks
            .iter()
            .filter(|(_, c)| c.document_id == document_id)
            .map(|(id, c)| Chunk {
                id: *id,
                document_id: c.document_id,
                chunk_index: c.chunk_index,
                content: c.content.clone(),
                embedding: Vector::from(c.embedding.clone()),
            })
            .collect();
        out.sort_by_key(|c| c.chunk_index);
        Ok(out)
    }

    async fn tweet_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.tweets.contains_key(id))
    }

    async fn insert_tweet(&self, tweet: &NewTweet) -> Result<bool, StoreError> {
        self.check_dimensions(&tweet.embedding)?;
        let mut inner = self.inner.write().await;
        if inner.tweets.contains_key(&tweet.id) {
            return Ok(false);
        }
        inner.next_tweet_seq += 1;
        let seq = inner.next_tweet_seq;
        inner.tweets.insert(
            tweet.id.clone(),
            StoredTweet {
                seq,
                tweet: Tweet {
                    id: tweet.id.clone(),
                    partner_id: tweet.partner_id.clone(),
                    date: tweet.date,
                    content: tweet.content.clone(),
                    username: tweet.username.clone(),
                    handle: tweet.handle.clone(),
                    reply_count: tweet.reply_count,
                    retweet_count: tweet.retweet_count,
                    like_count: tweet.like_count,
                    view_count: tweet.view_count,
                    image_url: tweet.image_url.clone(),
                    is_verified: tweet.is_verified,
                },
                embedding: tweet.embedding.clone(),
            },
        );
        Ok(true)
    }

    async fn recent_tweets(&self, partner_id: &str, limit: i64) -> Result<Vec<Tweet>, StoreError> {
        let inner = self.inner.read().await;
        let mut out: Vec<Tweet> = inner
            .tweets
            .values()
            .filter(|t| t.tweet.partner_id == partner_id)
            .map(|t| t.tweet.clone())
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        scope: &Scope,
        limit: i64,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        self.check_dimensions(query)?;
        let inner = self.inner.read().await;
        let mut hits = Vec::new();

        if scope.sources.includes_documents() {
            for (id, chunk) in &inner.chunks {
                let Some(doc) = inner.documents.get(&chunk.document_id) else {
                    continue;
                };
                if doc.partner_id != scope.partner_id {
                    continue;
                }
                hits.push(RankedHit {
                    result: RetrievalResult {
                        source: SourceKind::Chunk,
                        source_id: id.to_string(),
                        content: chunk.content.clone(),
                        label: doc.filename.clone(),
                        distance: cosine_distance(query, &chunk.embedding),
                    },
                    order: *id,
                });
            }
        }

        if scope.sources.includes_tweets() {
            for stored in inner.tweets.values() {
                if stored.tweet.partner_id != scope.partner_id {
                    continue;
                }
                hits.push(RankedHit {
                    result: RetrievalResult {
                        source: SourceKind::Tweet,
                        source_id: stored.tweet.id.clone(),
                        content: stored.tweet.content.clone(),
                        label: tweet_label(stored.tweet.handle.as_deref(), &stored.tweet.date),
                        distance: cosine_distance(query, &stored.embedding),
                    },
                    order: stored.seq,
                });
            }
        }

        Ok(rank(hits, limit.max(0) as usize))
    }

    async fn health(&self) -> Result<StoreHealth, StoreError> {
        let inner = self.inner.read().await;
        Ok(StoreHealth {
            backend: self.backend_name().to_string(),
            server_version: None,
            pgvector_version: None,
            documents: inner.documents.len() as i64,
            chunks: inner.chunks.len() as i64,
            tweets: inner.tweets.len() as i64,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
