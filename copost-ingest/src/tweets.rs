//! Tweet import: best-effort batch insert with id-based dedup.
//!
//! Records are processed in order. A known id is skipped before any
//! embedding call. A record that fails to embed or store is counted and
//! logged, and the batch moves on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use copost_core::embeddings::EmbeddingBackend;
use copost_core::models::{tweet_id, NewTweet, TweetRecord};
use copost_core::store::VectorStore;
use serde::Serialize;

use crate::pipeline::IngestionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Accepts RFC 3339, `YYYY-MM-DD[ HH:MM:SS]`, `Mon D, YYYY` and the classic
/// `Wed Oct 10 20:19:24 +0000 2018` API format. Date-only values are midnight UTC.
pub fn parse_tweet_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    ["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

enum Outcome {
    Imported,
    Skipped,
    Failed,
}

async fn import_one(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingBackend,
    partner_id: &str,
    index: usize,
    record: &TweetRecord,
) -> Outcome {
    let content = record.content.trim();
    if content.is_empty() {
        tracing::debug!(index = index, "Skipping tweet without content");
        return Outcome::Skipped;
    }
    let Some(date) = parse_tweet_date(&record.date) else {
        tracing::debug!(index = index, date = %record.date, "Skipping tweet with unparseable date");
        return Outcome::Skipped;
    };

    let id = tweet_id(content, &date);
    match store.tweet_exists(&id).await {
        Ok(true) => return Outcome::Skipped,
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(partner_id = partner_id, index = index, error = %e, "Tweet lookup failed");
            return Outcome::Failed;
        }
    }

    let embedding = match embedder.embed(content).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(partner_id = partner_id, index = index, error = %e, "Tweet embedding failed");
            return Outcome::Failed;
        }
    };

    let tweet = NewTweet {
        id,
        partner_id: partner_id.to_string(),
        date,
        content: content.to_string(),
        username: record.username.clone(),
        handle: record.handle.clone(),
        reply_count: record.reply_count,
        retweet_count: record.retweet_count,
        like_count: record.like_count,
        view_count: record.view_count,
        image_url: record.image_url.clone(),
        is_verified: record.is_verified,
        embedding,
    };

    match store.insert_tweet(&tweet).await {
        Ok(true) => Outcome::Imported,
        // Inserted concurrently between the lookup and the write
        Ok(false) => Outcome::Skipped,
        Err(e) => {
            tracing::warn!(partner_id = partner_id, index = index, error = %e, "Tweet insert failed");
            Outcome::Failed
        }
    }
}

pub async fn import_tweets(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingBackend,
    partner_id: &str,
    records: &[TweetRecord],
) -> Result<ImportSummary, IngestionError> {
    if partner_id.trim().is_empty() {
        return Err(IngestionError::InvalidInput(
            "partner_id must not be empty".to_string(),
        ));
    }

    let mut summary = ImportSummary::default();
    for (index, record) in records.iter().enumerate() {
        match import_one(store, embedder, partner_id, index, record).await {
            Outcome::Imported => summary.imported += 1,
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }

    tracing::info!(
        partner_id = partner_id,
        imported = summary.imported,
        skipped = summary.skipped,
        failed = summary.failed,
        "Tweet import finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Datelike, Timelike};
    use copost_core::embeddings::EmbeddingError;
    use copost_core::store::MemoryVectorStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_on_text: Option<&'static str>,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_text: None,
            }
        }
    }

    #[async_trait]
    impl EmbeddingBackend for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_text == Some(text) {
                return Err(EmbeddingError::Api {
                    code: 500,
                    message: "boom".into(),
                });
            }
            Ok(vec![text.len() as f32, 1.0, 0.5])
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn record(content: &str, date: &str) -> TweetRecord {
        TweetRecord {
            content: content.to_string(),
            date: date.to_string(),
            handle: Some("acme".to_string()),
            ..Default::default()
        }
    }

    fn batch() -> Vec<TweetRecord> {
        vec![
            record("gm builders", "2024-03-04T12:00:00Z"),
            record("mainnet is live", "Mar 5, 2024"),
            record("thread below", "2024-03-06"),
        ]
    }

    #[tokio::test]
    async fn test_importing_same_batch_twice_is_idempotent() {
        let store = MemoryVectorStore::new(3);
        let embedder = CountingEmbedder::new();

        let first = import_tweets(&store, &embedder, "acme", &batch()).await.unwrap();
        assert_eq!(
            first,
            ImportSummary {
                imported: 3,
                skipped: 0,
                failed: 0
            }
        );

        let second = import_tweets(&store, &embedder, "acme", &batch()).await.unwrap();
        assert_eq!(
            second,
            ImportSummary {
                imported: 0,
                skipped: 3,
                failed: 0
            }
        );

        // Known ids never reach the embedding provider
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.recent_tweets("acme", 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_records_without_content_or_date_are_skipped() {
        let store = MemoryVectorStore::new(3);
        let embedder = CountingEmbedder::new();
        let records = vec![
            record("   ", "2024-03-04"),
            record("no date", ""),
            record("bad date", "yesterday-ish"),
            record("fine", "2024-03-04"),
        ];

        let summary = import_tweets(&store, &embedder, "acme", &records).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_mixed_batch_with_null_text_imports_the_rest() {
        let store = MemoryVectorStore::new(3);
        let embedder = CountingEmbedder::new();
        let records: Vec<TweetRecord> = serde_json::from_str(
            r#"[
                {"text":"gm builders","created_at":"2024-03-04","likeCount":"1.2K"},
                {"text":null,"created_at":"2024-03-05"},
                {"text":"mainnet is live","created_at":null},
                {"text":"thread below","created_at":"2024-03-06","viewCount":null}
            ]"#,
        )
        .unwrap();

        let summary = import_tweets(&store, &embedder, "acme", &records).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                imported: 2,
                skipped: 2,
                failed: 0
            }
        );
        let stored = store.recent_tweets("acme", 10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|t| t.like_count == 1200));
    }

    #[tokio::test]
    async fn test_one_failing_record_does_not_abort_the_batch() {
        let store = MemoryVectorStore::new(3);
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail_on_text: Some("mainnet is live"),
        };

        let summary = import_tweets(&store, &embedder, "acme", &batch()).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                imported: 2,
                skipped: 0,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_empty_partner_is_rejected() {
        let store = MemoryVectorStore::new(3);
        let embedder = CountingEmbedder::new();
        assert!(import_tweets(&store, &embedder, " ", &batch()).await.is_err());
    }

    #[test]
    fn test_parse_tweet_date_formats() {
        let rfc = parse_tweet_date("2024-03-04T12:30:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 10);

        let api = parse_tweet_date("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!((api.year(), api.month(), api.day()), (2018, 10, 10));

        let short = parse_tweet_date("Mar 4, 2024").unwrap();
        assert_eq!((short.month(), short.day(), short.hour()), (3, 4, 0));

        assert!(parse_tweet_date("2024-02-30").is_none());
        assert!(parse_tweet_date("").is_none());
    }
}
