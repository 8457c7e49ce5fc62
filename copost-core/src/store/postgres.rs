//! Postgres + pgvector backend.
//!
//! Tables: `partner_documents`, `partner_chunks`, `partner_tweets`. Both
//! embedding columns carry an HNSW index with `vector_cosine_ops`, the same
//! metric the `<=>` queries below use.
//!
//! An HNSW scan only visits `hnsw.ef_search` candidates before the partner
//! filter runs, so a small partner in a large store could come back short.
//! Scoped searches therefore run in a transaction that either turns on
//! iterative index scans (pgvector 0.8+) or falls back to an exact scan.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::PgPool;

use super::{rank, RankedHit, StoreError, StoreHealth, VectorStore};
use crate::db;
use crate::models::tweet::tweet_label;
use crate::models::{Chunk, DocumentSummary, NewTweet, RetrievalResult, Scope, SourceKind, Tweet};

/// Advisory lock key serialising concurrent schema creation.
const SCHEMA_LOCK_KEY: i64 = 0x636f_706f_7374;

/// Postgres SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Keeps filtering past the first `ef_search` candidates until `LIMIT` is met.
const ITERATIVE_SCAN: &str = "SET LOCAL hnsw.iterative_scan = relaxed_order";

/// Older pgvector: skip the approximate index so the partner filter sees every row.
const EXACT_SCAN: &str = "SET LOCAL enable_indexscan = off";

#[derive(Clone)]
pub struct PgVectorStore {
    pool: PgPool,
    dimensions: usize,
    scan_setting: Arc<OnceLock<&'static str>>,
}

/// `hnsw.iterative_scan` exists from pgvector 0.8.0.
pub(crate) fn supports_iterative_scan(extversion: &str) -> bool {
    let mut parts = extversion.trim().split('.').map(|p| p.parse::<u32>().ok());
    match (parts.next().flatten(), parts.next().flatten()) {
        (Some(major), Some(minor)) => (major, minor) >= (0, 8),
        _ => false,
    }
}

impl PgVectorStore {
    pub fn new(pool: PgPool, dimensions: usize) -> Self {
        Self {
            pool,
            dimensions,
            scan_setting: Arc::new(OnceLock::new()),
        }
    }

    /// Session setting applied before partner-scoped nearest-neighbour queries.
    async fn scoped_scan_setting(&self) -> Result<&'static str, StoreError> {
        if let Some(setting) = self.scan_setting.get() {
            return Ok(*setting);
        }
        let version = db::check_pgvector(&self.pool).await?;
        let setting = if supports_iterative_scan(&version) {
            ITERATIVE_SCAN
        } else {
            EXACT_SCAN
        };
        tracing::debug!(pgvector = %version, setting = setting, "Scoped scan mode selected");
        Ok(*self.scan_setting.get_or_init(|| setting))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn schema_statements(&self) -> Vec<String> {
        let n = self.dimensions;
        vec![
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            "CREATE TABLE IF NOT EXISTS partner_documents (
                id BIGSERIAL PRIMARY KEY,
                partner_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                expected_chunks INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
            .to_string(),
            "CREATE INDEX IF NOT EXISTS partner_documents_partner_idx
                ON partner_documents (partner_id)"
                .to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS partner_chunks (
                    id BIGSERIAL PRIMARY KEY,
                    document_id BIGINT NOT NULL REFERENCES partner_documents(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    embedding vector({n}) NOT NULL,
                    chunk_index INTEGER NOT NULL
                )"
            ),
            "CREATE INDEX IF NOT EXISTS partner_chunks_document_idx
                ON partner_chunks (document_id, chunk_index)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS partner_chunks_embedding_idx
                ON partner_chunks USING hnsw (embedding vector_cosine_ops)"
                .to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS partner_tweets (
                    id TEXT PRIMARY KEY,
                    partner_id TEXT NOT NULL,
                    date TIMESTAMPTZ NOT NULL,
                    content TEXT NOT NULL,
                    username TEXT,
                    handle TEXT,
                    reply_count INTEGER NOT NULL DEFAULT 0,
                    retweet_count INTEGER NOT NULL DEFAULT 0,
                    like_count INTEGER NOT NULL DEFAULT 0,
                    view_count INTEGER NOT NULL DEFAULT 0,
                    image_url TEXT,
                    is_verified BOOLEAN NOT NULL DEFAULT false,
                    embedding vector({n}) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )"
            ),
            "CREATE INDEX IF NOT EXISTS partner_tweets_partner_date_idx
                ON partner_tweets (partner_id, date DESC)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS partner_tweets_embedding_idx
                ON partner_tweets USING hnsw (embedding vector_cosine_ops)"
                .to_string(),
        ]
    }

    /// Width of an existing vector column; pgvector stores it as the type modifier.
    async fn column_width(&self, table: &str) -> Result<Option<i32>, StoreError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT a.atttypmod
             FROM pg_attribute a
             JOIN pg_class c ON c.oid = a.attrelid
             WHERE c.relname = $1 AND a.attname = 'embedding' AND NOT a.attisdropped",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }
}

fn map_insert_error(e: sqlx::Error, document_id: i64) -> StoreError {
    let is_fk = e
        .as_database_error()
        .and_then(|d| d.code())
        .map(|code| code == FOREIGN_KEY_VIOLATION)
        .unwrap_or(false);
    if is_fk {
        StoreError::DocumentNotFound(document_id)
    } else {
        StoreError::Database(e)
    }
}

#[derive(sqlx::FromRow)]
struct ChunkHit {
    id: i64,
    content: String,
    filename: String,
    distance: f64,
}

#[derive(sqlx::FromRow)]
struct TweetHit {
    id: String,
    content: String,
    handle: Option<String>,
    date: DateTime<Utc>,
    seq: i64,
    distance: f64,
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        for statement in self.schema_statements() {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        for table in ["partner_chunks", "partner_tweets"] {
            if let Some(width) = self.column_width(table).await? {
                if width as usize != self.dimensions {
                    return Err(StoreError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: width as usize,
                    });
                }
            }
        }

        tracing::info!(dimensions = self.dimensions, "Vector store schema ready");
        Ok(())
    }

    async fn insert_document(
        &self,
        partner_id: &str,
        filename: &str,
        expected_chunks: i32,
    ) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO partner_documents (partner_id, filename, expected_chunks)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(partner_id)
        .bind(filename)
        .bind(expected_chunks)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn insert_chunk(
        &self,
        document_id: i64,
        chunk_index: i32,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StoreError> {
        self.check_dimensions(embedding)?;
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO partner_chunks (document_id, content, embedding, chunk_index)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(document_id)
        .bind(content)
        .bind(Vector::from(embedding.to_vec()))
        .bind(chunk_index)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, document_id))?;
        Ok(row.0)
    }

    async fn delete_document(&self, document_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM partner_documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_documents(&self, partner_id: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentSummary>(
            "SELECT d.id, d.partner_id, d.filename, d.expected_chunks,
                    COUNT(c.id) AS stored_chunks, d.created_at
             FROM partner_documents d
             LEFT JOIN partner_chunks c ON c.document_id = d.id
             WHERE d.partner_id = $1
             GROUP BY d.id
             ORDER BY d.created_at DESC, d.id DESC",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn document_chunks(&self, document_id: i64) -> Result<Vec<Chunk>, StoreError> {
        let rows = sqlx::query_as::<_, Chunk>(
            "SELECT id, document_id, chunk_index, content, embedding
             FROM partner_chunks
             WHERE document_id = $1
             ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn tweet_exists(&self, id: &str) -> Result<bool, StoreError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM partner_tweets WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn insert_tweet(&self, tweet: &NewTweet) -> Result<bool, StoreError> {
        self.check_dimensions(&tweet.embedding)?;
        let result = sqlx::query(
            "INSERT INTO partner_tweets
                (id, partner_id, date, content, username, handle, reply_count,
                 retweet_count, like_count, view_count, image_url, is_verified, embedding)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&tweet.id)
        .bind(&tweet.partner_id)
        .bind(tweet.date)
        .bind(&tweet.content)
        .bind(&tweet.username)
        .bind(&tweet.handle)
        .bind(tweet.reply_count)
        .bind(tweet.retweet_count)
        .bind(tweet.like_count)
        .bind(tweet.view_count)
        .bind(&tweet.image_url)
        .bind(tweet.is_verified)
        .bind(Vector::from(tweet.embedding.clone()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recent_tweets(&self, partner_id: &str, limit: i64) -> Result<Vec<Tweet>, StoreError> {
        let rows = sqlx::query_as::<_, Tweet>(
            "SELECT id, partner_id, date, content, username, handle, reply_count,
                    retweet_count, like_count, view_count, image_url, is_verified
             FROM partner_tweets
             WHERE partner_id = $1
             ORDER BY date DESC, id
             LIMIT $2",
        )
        .bind(partner_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        scope: &Scope,
        limit: i64,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        self.check_dimensions(query)?;
        let limit = limit.max(0);
        let query_vec = Vector::from(query.to_vec());
        let mut hits = Vec::new();

        let scan_setting = self.scoped_scan_setting().await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(scan_setting).execute(&mut *tx).await?;

        if scope.sources.includes_documents() {
            let rows = sqlx::query_as::<_, ChunkHit>(
                "SELECT c.id, c.content, d.filename,
                        (c.embedding <=> $1)::float8 AS distance
                 FROM partner_chunks c
                 JOIN partner_documents d ON d.id = c.document_id
                 WHERE d.partner_id = $2
                 ORDER BY c.embedding <=> $1, c.id
                 LIMIT $3",
            )
            .bind(&query_vec)
            .bind(&scope.partner_id)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?;

            hits.extend(rows.into_iter().map(|r| RankedHit {
                result: RetrievalResult {
                    source: SourceKind::Chunk,
                    source_id: r.id.to_string(),
                    content: r.content,
                    label: r.filename,
                    distance: r.distance,
                },
                order: r.id,
            }));
        }

        if scope.sources.includes_tweets() {
            let rows = sqlx::query_as::<_, TweetHit>(
                "SELECT id, content, handle, date,
                        (extract(epoch FROM created_at) * 1000000)::bigint AS seq,
                        (embedding <=> $1)::float8 AS distance
                 FROM partner_tweets
                 WHERE partner_id = $2
                 ORDER BY embedding <=> $1, created_at
                 LIMIT $3",
            )
            .bind(&query_vec)
            .bind(&scope.partner_id)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?;

            hits.extend(rows.into_iter().map(|r| RankedHit {
                result: RetrievalResult {
                    source: SourceKind::Tweet,
                    label: tweet_label(r.handle.as_deref(), &r.date),
                    source_id: r.id,
                    content: r.content,
                    distance: r.distance,
                },
                order: r.seq,
            }));
        }

        tx.commit().await?;

        // Iterative scans return rows in relaxed order; rank restores it
        Ok(rank(hits, limit as usize))
    }

    async fn health(&self) -> Result<StoreHealth, StoreError> {
        let server_version = db::health_check(&self.pool).await?;
        let pgvector_version = db::check_pgvector(&self.pool).await.ok();
        let counts: (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM partner_documents),
                    (SELECT COUNT(*) FROM partner_chunks),
                    (SELECT COUNT(*) FROM partner_tweets)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreHealth {
            backend: self.backend_name().to_string(),
            server_version: Some(server_version),
            pgvector_version,
            documents: counts.0,
            chunks: counts.1,
            tweets: counts.2,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// TESTS (require a running Postgres with pgvector; skipped otherwise)
// ============================================================================
