//! Ingestion paths into the vector store: chunked documents, tweet batches,
//! and the pasted-timeline text parser that feeds tweet import.

pub mod pipeline;
pub mod timeline;
pub mod tweets;

pub use pipeline::{ingest_document, DocumentInput, IngestProgress, IngestReport, IngestionError};
pub use timeline::{parse_timeline, ParsedTimeline, ParsedTweet};
pub use tweets::{import_tweets, parse_tweet_date, ImportSummary};
