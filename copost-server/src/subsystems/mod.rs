pub mod drafts;
pub mod generate;
pub mod ingest;
pub mod prompts;
pub mod providers;
pub mod retrieve;
