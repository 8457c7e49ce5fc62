use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::partner::Partner;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTemplate {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub title: String,
    pub template: String,
    pub topic: String,
    /// Alignment with the retrieved context, in `[0, 1]`.
    pub relevance: f64,
    pub brief: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedIdea {
    #[serde(flatten)]
    pub idea: Idea,
    #[serde(default, alias = "additionalSuggestions")]
    pub additional_suggestions: Vec<String>,
}

/// One calendar slot of co-marketing content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: String,
    pub date: NaiveDate,
    /// Snapshot of the partner at scheduling time.
    pub partner: Partner,
    pub content_type: String,
    pub time_slot: String,
    #[serde(default)]
    pub generated_content: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub selected_idea: Option<Idea>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub draft_id: Option<String>,
}

impl ScheduleEvent {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        partner: Partner,
        content_type: impl Into<String>,
        time_slot: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            partner,
            content_type: content_type.into(),
            time_slot: time_slot.into(),
            generated_content: None,
            is_approved: false,
            selected_idea: None,
            ideas: Vec::new(),
            draft_id: None,
        }
    }
}
