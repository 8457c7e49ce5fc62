pub mod chat;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod ipc;
pub mod models;
pub mod openai;
pub mod retry;
pub mod state;
pub mod store;

pub use chat::{ChatBackend, ChatClientConfig, ChatError, ChatRequest, OpenAiChatClient};
pub use chunker::{split_text, ChunkConfig, ChunkError};
pub use config::CopostConfig;
pub use embeddings::{
    EmbeddingBackend, EmbeddingConfig, EmbeddingError, OpenAiEmbeddingClient,
    EMBEDDING_DIMENSIONS,
};
pub use error::CopostError;
pub use retry::{RetryPolicy, RetryingChat, RetryingEmbedder};
pub use state::{Action, AppState, StateError, StateStore};
pub use store::{MemoryVectorStore, PgVectorStore, StoreError, VectorStore};
