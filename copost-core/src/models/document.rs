use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: i64,
    pub partner_id: String,
    pub filename: String,
    pub expected_chunks: i32,
    pub created_at: DateTime<Utc>,
}

/// Listing row: a document plus the number of chunks actually stored.
///
/// `stored_chunks < expected_chunks` marks an incomplete ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentSummary {
    pub id: i64,
    pub partner_id: String,
    pub filename: String,
    pub expected_chunks: i32,
    pub stored_chunks: i64,
    pub created_at: DateTime<Utc>,
}

impl DocumentSummary {
    pub fn is_complete(&self) -> bool {
        self.stored_chunks >= i64::from(self.expected_chunks)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Vector,
}
