//! Document ingestion: chunk, embed and store one document
//!
//! Chunks are embedded and written one at a time, in order. The document row
//! is written first so every chunk has a parent. The first failure stops the
//! run and returns `IngestionError::Partial`; whether to keep or delete the
//! incomplete document is left to the caller.

use copost_core::chunker::{self, ChunkConfig, ChunkError};
use copost_core::embeddings::{EmbeddingBackend, EmbeddingError};
use copost_core::store::{StoreError, VectorStore};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub partner_id: &'a str,
    pub filename: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IngestProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

impl IngestProgress {
    fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            completed,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: i64,
    pub partner_id: String,
    pub filename: String,
    pub chunks: usize,
}

/// Why a single chunk could not be stored.
#[derive(Error, Debug)]
pub enum ChunkFailure {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}

impl ChunkFailure {
    pub fn is_transient(&self) -> bool {
        match self {
            ChunkFailure::Embedding(e) => e.is_transient(),
            ChunkFailure::Store(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid chunking config: {0}")]
    Chunking(#[from] ChunkError),

    /// Nothing was written.
    #[error("could not create document: {0}")]
    Store(#[from] StoreError),

    #[error(
        "document {document_id} partially ingested{}: chunk {failed_index} failed after {succeeded} of {total} stored: {source}",
        disposition(.deleted)
    )]
    Partial {
        document_id: i64,
        /// Set once the caller has removed the incomplete document; the id no
        /// longer resolves.
        deleted: bool,
        failed_index: usize,
        succeeded: usize,
        total: usize,
        #[source]
        source: ChunkFailure,
    },
}

fn disposition(deleted: &bool) -> &'static str {
    if *deleted {
        " and deleted"
    } else {
        ""
    }
}

impl IngestionError {
    /// Error class reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::InvalidInput(_) | IngestionError::Chunking(_) => "validation",
            IngestionError::Store(_) => "internal",
            IngestionError::Partial { source, .. } => match source {
                ChunkFailure::Embedding(_) => "provider",
                ChunkFailure::Store(_) => "internal",
            },
        }
    }
}

fn require(value: &str, field: &str) -> Result<(), IngestionError> {
    if value.trim().is_empty() {
        return Err(IngestionError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Chunk, embed and store one document.
///
/// `progress` is called after every stored chunk.
pub async fn ingest_document<F>(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingBackend,
    chunking: &ChunkConfig,
    input: DocumentInput<'_>,
    mut progress: F,
) -> Result<IngestReport, IngestionError>
where
    F: FnMut(IngestProgress) + Send,
{
    require(input.partner_id, "partner_id")?;
    require(input.filename, "filename")?;
    require(input.text, "text")?;

    let chunks = chunker::split_with(input.text, chunking);
    let total = chunks.len();

    let document_id = store
        .insert_document(input.partner_id, input.filename, total as i32)
        .await?;

    tracing::info!(
        partner_id = input.partner_id,
        document_id = document_id,
        filename = input.filename,
        chunks = total,
        "Ingesting document"
    );

    for (index, content) in chunks.iter().enumerate() {
        if let Err(source) = store_chunk(store, embedder, document_id, index, content).await {
            tracing::error!(
                document_id = document_id,
                chunk_index = index,
                succeeded = index,
                total = total,
                error = %source,
                "Chunk ingestion failed"
            );
            return Err(IngestionError::Partial {
                document_id,
                deleted: false,
                failed_index: index,
                succeeded: index,
                total,
                source,
            });
        }

        let update = IngestProgress::new(index + 1, total);
        tracing::debug!(
            document_id = document_id,
            chunk_index = index,
            percent = update.percent,
            "Chunk stored"
        );
        progress(update);
    }

    tracing::info!(document_id = document_id, chunks = total, "Document ingested");

    Ok(IngestReport {
        document_id,
        partner_id: input.partner_id.to_string(),
        filename: input.filename.to_string(),
        chunks: total,
    })
}

async fn store_chunk(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingBackend,
    document_id: i64,
    index: usize,
    content: &str,
) -> Result<i64, ChunkFailure> {
    let embedding = embedder.embed(content).await?;
    let id = store
        .insert_chunk(document_id, index as i32, content, &embedding)
        .await?;
    Ok(id)
}
