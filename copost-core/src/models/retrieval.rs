use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Chunk,
    Tweet,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Chunk => "chunk",
            SourceKind::Tweet => "tweet",
        }
    }
}

/// Which tables a nearest-neighbour query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sources {
    #[default]
    Documents,
    Tweets,
    All,
}

impl Sources {
    pub fn includes_documents(&self) -> bool {
        matches!(self, Sources::Documents | Sources::All)
    }

    pub fn includes_tweets(&self) -> bool {
        matches!(self, Sources::Tweets | Sources::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub partner_id: String,
    pub sources: Sources,
}

impl Scope {
    pub fn documents(partner_id: impl Into<String>) -> Self {
        Self {
            partner_id: partner_id.into(),
            sources: Sources::Documents,
        }
    }

    pub fn with_sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }
}

/// One nearest-neighbour hit. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub source: SourceKind,
    /// Chunk id (as text) or tweet hash.
    pub source_id: String,
    pub content: String,
    /// Filename for chunks, `@handle date` for tweets.
    pub label: String,
    /// Cosine distance; smaller is closer.
    pub distance: f64,
}
