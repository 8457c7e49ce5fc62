use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::{CopostConfig, DatabaseConfig, StoreBackend};
use crate::error::CopostError;
use crate::store::{MemoryVectorStore, PgVectorStore, VectorStore};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

pub async fn check_pgvector(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) =
        sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

/// Build the configured store backend and make sure its schema exists.
pub async fn open_store(config: &CopostConfig) -> Result<Arc<dyn VectorStore>, CopostError> {
    let dimensions = config.embedding.dimensions;
    let store: Arc<dyn VectorStore> = match config.database.backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                "Connected to PostgreSQL"
            );
            Arc::new(PgVectorStore::new(pool, dimensions))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory vector store; data is lost on exit");
            Arc::new(MemoryVectorStore::new(dimensions))
        }
    };
    store.ensure_schema().await?;
    Ok(store)
}
