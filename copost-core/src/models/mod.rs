pub mod content;
pub mod document;
pub mod partner;
pub mod retrieval;
pub mod tweet;

pub use content::{ContentTemplate, Idea, RefinedIdea, ScheduleEvent};
pub use document::{Chunk, Document, DocumentSummary};
pub use partner::{Assumption, Partner, SELF_PARTNER_ID};
pub use retrieval::{RetrievalResult, Scope, SourceKind, Sources};
pub use tweet::{tweet_id, NewTweet, Tweet, TweetRecord};
