use serde::{Deserialize, Serialize};

use crate::models::{Idea, Sources, TweetRecord};
use crate::state::Action;

pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Inputs for a content generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRequest {
    /// Title of a template in the current state.
    pub template: String,
    pub word_count: u32,
    /// Recent partner activity (tweets, announcements).
    #[serde(default)]
    pub additional_context: Option<String>,
    /// Free text from the user.
    #[serde(default)]
    pub user_context: Option<String>,
    #[serde(default)]
    pub idea: Option<Idea>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdeaRequest {
    #[serde(default)]
    pub additional_context: Option<String>,
    #[serde(default)]
    pub user_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineRequest {
    pub idea: Idea,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    #[serde(default)]
    pub threadify: bool,
    #[serde(default)]
    pub share: bool,
    #[serde(default)]
    pub auto_retweet_enabled: bool,
    #[serde(default)]
    pub auto_plug_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CopostRequest {
    Ping,
    Health,
    IngestDocument {
        partner_id: String,
        filename: String,
        text: String,
    },
    DeleteDocument {
        document_id: i64,
    },
    ListDocuments {
        partner_id: String,
    },
    ImportTweets {
        partner_id: String,
        records: Vec<TweetRecord>,
    },
    /// Parse pasted timeline text; when `partner_id` is set, also import the tweets.
    ParseTimeline {
        text: String,
        #[serde(default)]
        partner_id: Option<String>,
    },
    Search {
        query: String,
        partner_id: String,
        limit: Option<u32>,
        #[serde(default)]
        sources: Sources,
    },
    GenerateIdeas {
        event_id: String,
        #[serde(default)]
        request: IdeaRequest,
    },
    RefineIdea {
        event_id: String,
        request: RefineRequest,
    },
    GenerateContent {
        event_id: String,
        request: ContentRequest,
    },
    GenerateAssumptions {
        partner_id: String,
    },
    ApproveEvent {
        event_id: String,
    },
    PublishEvent {
        event_id: String,
        #[serde(default)]
        options: PublishOptions,
    },
    Dispatch {
        #[serde(rename = "state_action")]
        action: Action,
    },
    GetState,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CopostResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Error class for callers that map to transport codes: `validation`,
    /// `format`, `provider`, `not_found` or `internal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub version: String,
}

impl CopostResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::err_kind("internal", msg)
    }

    pub fn err_kind(kind: &str, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            kind: Some(kind.to_string()),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_tagged_by_action() {
        let req: CopostRequest = serde_json::from_value(serde_json::json!({
            "action": "search",
            "query": "staking",
            "partner_id": "acme",
            "limit": 3
        }))
        .unwrap();
        match req {
            CopostRequest::Search {
                query,
                partner_id,
                limit,
                sources,
            } => {
                assert_eq!(query, "staking");
                assert_eq!(partner_id, "acme");
                assert_eq!(limit, Some(3));
                assert_eq!(sources, Sources::Documents);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_wraps_state_action() {
        let req: CopostRequest = serde_json::from_value(serde_json::json!({
            "action": "dispatch",
            "state_action": { "type": "approve_event_content", "event_id": "e1" }
        }))
        .unwrap();
        assert!(matches!(
            req,
            CopostRequest::Dispatch {
                action: Action::ApproveEventContent { .. }
            }
        ));
    }

    #[test]
    fn test_error_response_carries_kind() {
        let resp = CopostResponse::err_kind("format", "bad json");
        assert!(!resp.is_ok());
        assert_eq!(resp.kind.as_deref(), Some("format"));
        assert_eq!(resp.error.as_deref(), Some("bad json"));
    }
}
