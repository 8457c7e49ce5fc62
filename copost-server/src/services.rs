//! Shared service context for the IPC router and the HTTP API.

use std::sync::Arc;

use copost_core::chat::ChatBackend;
use copost_core::chunker::ChunkConfig;
use copost_core::embeddings::EmbeddingBackend;
use copost_core::state::StateStore;
use copost_core::store::VectorStore;
use copost_core::{CopostConfig, CopostError};

use crate::subsystems::drafts::DraftClient;
use crate::subsystems::providers;

#[derive(Clone)]
pub struct Services {
    pub config: CopostConfig,
    pub chunking: ChunkConfig,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub chat: Arc<dyn ChatBackend>,
    pub drafts: DraftClient,
    pub state: Arc<StateStore>,
}

impl Services {
    /// Assemble from already-built parts. The embedder and chat backends are
    /// used as given; wrap them in a retry policy first if wanted.
    pub fn new(
        config: CopostConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        chat: Arc<dyn ChatBackend>,
        state: Arc<StateStore>,
    ) -> Result<Self, CopostError> {
        config.validate()?;
        let chunking = config.chunking.to_chunk_config()?;

        if embedder.dimensions() != store.dimensions() {
            return Err(CopostError::InvalidConfig(format!(
                "embedding backend '{}' returns {} dimensions but the store expects {}",
                embedder.name(),
                embedder.dimensions(),
                store.dimensions()
            )));
        }

        let drafts = DraftClient::new(&config.drafts)
            .map_err(|e| CopostError::InvalidConfig(format!("drafts client: {}", e)))?;

        Ok(Self {
            config,
            chunking,
            store,
            embedder,
            chat,
            drafts,
            state,
        })
    }

    /// Open the store, build the providers and load the state file.
    pub async fn from_config(config: CopostConfig) -> Result<Self, CopostError> {
        let store = copost_core::db::open_store(&config).await?;
        let embedder = providers::create_embedder(&config)?;
        let chat = providers::create_chat(&config)?;
        let state = Arc::new(StateStore::load(&config.state.path).await?);

        Self::new(config, store, embedder, chat, state)
    }
}
