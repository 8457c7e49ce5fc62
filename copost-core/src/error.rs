use thiserror::Error;

use crate::chat::ChatError;
use crate::chunker::ChunkError;
use crate::embeddings::EmbeddingError;
use crate::state::StateError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CopostError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IPC error: {0}")]
    Ipc(String),
}
