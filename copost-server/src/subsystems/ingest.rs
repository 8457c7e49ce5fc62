//! Ingest subsystem: document, tweet and timeline intake for the service
//!
//! Wraps the `copost-ingest` pipelines with the service's store, embedder and
//! chunking config, and applies `ingest.on_partial_failure` when a document
//! is only partly stored.

use chrono::Utc;
use copost_core::config::PartialFailurePolicy;
use copost_core::models::TweetRecord;
use copost_ingest::{
    import_tweets, ingest_document, parse_timeline, DocumentInput, ImportSummary,
    IngestProgress, IngestReport, IngestionError, ParsedTimeline,
};
use serde::Serialize;

use crate::Services;

#[derive(Debug, Serialize)]
pub struct TimelineImport {
    pub timeline: ParsedTimeline,
    /// Present when the parsed tweets were imported for a partner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportSummary>,
}

pub async fn ingest(
    services: &Services,
    partner_id: &str,
    filename: &str,
    text: &str,
) -> Result<IngestReport, IngestionError> {
    let input = DocumentInput {
        partner_id,
        filename,
        text,
    };
    let log_progress = |p: IngestProgress| {
        tracing::info!(
            partner_id = partner_id,
            filename = filename,
            completed = p.completed,
            total = p.total,
            percent = p.percent,
            "Ingest progress"
        );
    };

    let mut result = ingest_document(
        services.store.as_ref(),
        services.embedder.as_ref(),
        &services.chunking,
        input,
        log_progress,
    )
    .await;

    if let Err(IngestionError::Partial {
        document_id,
        deleted,
        ..
    }) = &mut result
    {
        *deleted = apply_partial_policy(services, *document_id).await;
    }
    result
}

/// Returns whether the incomplete document was removed.
async fn apply_partial_policy(services: &Services, document_id: i64) -> bool {
    match services.config.ingest.on_partial_failure {
        PartialFailurePolicy::Keep => {
            tracing::warn!(document_id = document_id, "Keeping partially ingested document");
            false
        }
        PartialFailurePolicy::Delete => match services.store.delete_document(document_id).await {
            Ok(_) => {
                tracing::warn!(document_id = document_id, "Deleted partially ingested document");
                true
            }
            Err(e) => {
                tracing::error!(
                    document_id = document_id,
                    error = %e,
                    "Failed to delete partially ingested document"
                );
                false
            }
        },
    }
}

pub async fn import(
    services: &Services,
    partner_id: &str,
    records: &[TweetRecord],
) -> Result<ImportSummary, IngestionError> {
    import_tweets(
        services.store.as_ref(),
        services.embedder.as_ref(),
        partner_id,
        records,
    )
    .await
}

/// Parse pasted timeline text, importing the tweets when a partner is given.
pub async fn timeline(
    services: &Services,
    text: &str,
    partner_id: Option<&str>,
) -> Result<TimelineImport, IngestionError> {
    let timeline = parse_timeline(text, Utc::now().date_naive());
    tracing::info!(
        handle = %timeline.partner_handle,
        tweets = timeline.tweets.len(),
        "Timeline parsed"
    );

    let import = match partner_id {
        Some(partner_id) => Some(import(services, partner_id, &timeline.to_records()).await?),
        None => None,
    };

    Ok(TimelineImport { timeline, import })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use copost_core::chat::{ChatBackend, ChatError, ChatRequest};
    use copost_core::embeddings::{EmbeddingBackend, EmbeddingError};
    use copost_core::state::{AppState, StateStore};
    use copost_core::store::{MemoryVectorStore, VectorStore};
    use copost_core::CopostConfig;

    use super::*;

    const DIMS: usize = 4;

    /// Fails every chunk that starts with "poison".
    struct PoisonEmbedder;

    #[async_trait]
    impl EmbeddingBackend for PoisonEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.starts_with("poison") {
                return Err(EmbeddingError::Api {
                    code: 500,
                    message: "upstream down".into(),
                });
            }
            Ok(vec![1.0, 0.0, 0.0, text.len() as f32])
        }

        fn dimensions(&self) -> usize {
            DIMS
        }

        fn name(&self) -> &str {
            "poison"
        }
    }

    struct NoChat;

    #[async_trait]
    impl ChatBackend for NoChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ChatError> {
            Err(ChatError::EmptyResponse)
        }

        fn name(&self) -> &str {
            "none"
        }
    }

    fn services(policy: PartialFailurePolicy) -> Services {
        let mut config = CopostConfig::in_memory();
        config.embedding.dimensions = DIMS;
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 0;
        config.ingest.on_partial_failure = policy;
        Services::new(
            config,
            Arc::new(MemoryVectorStore::new(DIMS)),
            Arc::new(PoisonEmbedder),
            Arc::new(NoChat),
            Arc::new(StateStore::in_memory(AppState::default())),
        )
        .unwrap()
    }

    fn poisoned_text() -> String {
        format!("{}poison{}", "x".repeat(100), "y".repeat(94))
    }

    #[tokio::test]
    async fn test_delete_policy_marks_partial_error_as_deleted() {
        let services = services(PartialFailurePolicy::Delete);

        let err = ingest(&services, "acme", "guide.md", &poisoned_text())
            .await
            .unwrap_err();

        match &err {
            IngestionError::Partial {
                document_id,
                deleted,
                failed_index,
                ..
            } => {
                assert!(*deleted);
                assert_eq!(*failed_index, 1);
                assert!(services.store.document_chunks(*document_id).await.unwrap().is_empty());
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
        assert!(err.to_string().contains("and deleted"));
        assert!(services.store.list_documents("acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keep_policy_leaves_incomplete_document_listed() {
        let services = services(PartialFailurePolicy::Keep);

        let err = ingest(&services, "acme", "guide.md", &poisoned_text())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::Partial { deleted: false, .. }));
        assert!(!err.to_string().contains("and deleted"));
        let listed = services.store.list_documents("acme").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].expected_chunks, 2);
        assert_eq!(listed[0].stored_chunks, 1);
    }
}
