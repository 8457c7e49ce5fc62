//! Application state: partners, schedule, templates and preferences
//!
//! State changes only through `Action`s. `reduce` is pure: it takes a state
//! and an action and returns the next state, leaving the input untouched.
//! `StateStore` serialises dispatches behind a write lock, validates each
//! action against the current state, and persists the result to a JSON file
//! before publishing it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Assumption, ContentTemplate, Idea, Partner, ScheduleEvent, SELF_PARTNER_ID};

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,
    #[serde(default = "default_time_slots")]
    pub time_slots: Vec<String>,
}

fn default_content_types() -> Vec<String> {
    vec!["Tweet".to_string(), "Blog".to_string()]
}

fn default_time_slots() -> Vec<String> {
    vec![
        "morning".to_string(),
        "afternoon".to_string(),
        "evening".to_string(),
    ]
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            content_types: default_content_types(),
            time_slots: default_time_slots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub partners: Vec<Partner>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEvent>,
    #[serde(default = "default_templates")]
    pub templates: Vec<ContentTemplate>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            partners: Vec::new(),
            schedule: Vec::new(),
            templates: default_templates(),
            preferences: Preferences::default(),
        }
    }
}

impl AppState {
    pub fn partner(&self, id: &str) -> Option<&Partner> {
        self.partners.iter().find(|p| p.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&ScheduleEvent> {
        self.schedule.iter().find(|e| e.id == id)
    }

    pub fn template(&self, title: &str) -> Option<&ContentTemplate> {
        self.templates.iter().find(|t| t.title == title)
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerWeight {
    pub twitter: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AddPartner {
        partner: Partner,
    },
    RemovePartner {
        partner_id: String,
    },
    /// Patch the listed fields; `None` leaves a field unchanged.
    UpdatePartner {
        partner_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        weight: Option<u32>,
        #[serde(default)]
        twitter: Option<String>,
    },
    SetPartnerAssumptions {
        partner_id: String,
        assumptions: Vec<Assumption>,
    },
    AddPartnerAssumption {
        partner_id: String,
        assumption: Assumption,
    },
    AddPartnerAssumptions {
        partner_id: String,
        assumptions: Vec<Assumption>,
    },
    RemovePartnerAssumption {
        partner_id: String,
        index: usize,
    },
    SetSchedule {
        events: Vec<ScheduleEvent>,
    },
    UpdatePreferences {
        #[serde(default)]
        content_types: Option<Vec<String>>,
        #[serde(default)]
        time_slots: Option<Vec<String>>,
    },
    SetTemplates {
        templates: Vec<ContentTemplate>,
    },
    AddTemplate {
        template: ContentTemplate,
    },
    UpdateTemplate {
        index: usize,
        template: ContentTemplate,
    },
    /// New content always clears approval.
    UpdateEventGeneratedContent {
        event_id: String,
        content: String,
        #[serde(default)]
        selected_idea: Option<Idea>,
    },
    SetEventIdeas {
        event_id: String,
        ideas: Vec<Idea>,
    },
    SelectEventIdea {
        event_id: String,
        idea: Option<Idea>,
    },
    ApproveEventContent {
        event_id: String,
    },
    UnapproveEventContent {
        event_id: String,
    },
    SetEventDraft {
        event_id: String,
        draft_id: String,
    },
    /// Copy weights onto partners whose twitter handle matches (case-insensitive).
    SyncPartnerWeights {
        weights: Vec<PartnerWeight>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddPartner { .. } => "add_partner",
            Action::RemovePartner { .. } => "remove_partner",
            Action::UpdatePartner { .. } => "update_partner",
            Action::SetPartnerAssumptions { .. } => "set_partner_assumptions",
            Action::AddPartnerAssumption { .. } => "add_partner_assumption",
            Action::AddPartnerAssumptions { .. } => "add_partner_assumptions",
            Action::RemovePartnerAssumption { .. } => "remove_partner_assumption",
            Action::SetSchedule { .. } => "set_schedule",
            Action::UpdatePreferences { .. } => "update_preferences",
            Action::SetTemplates { .. } => "set_templates",
            Action::AddTemplate { .. } => "add_template",
            Action::UpdateTemplate { .. } => "update_template",
            Action::UpdateEventGeneratedContent { .. } => "update_event_generated_content",
            Action::SetEventIdeas { .. } => "set_event_ideas",
            Action::SelectEventIdea { .. } => "select_event_idea",
            Action::ApproveEventContent { .. } => "approve_event_content",
            Action::UnapproveEventContent { .. } => "unapprove_event_content",
            Action::SetEventDraft { .. } => "set_event_draft",
            Action::SyncPartnerWeights { .. } => "sync_partner_weights",
        }
    }
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Partner '{0}' not found")]
    PartnerNotFound(String),

    #[error("Partner '{0}' already exists")]
    DuplicatePartner(String),

    #[error("The self partner cannot be removed")]
    SelfPartnerProtected,

    #[error("Event '{0}' not found")]
    EventNotFound(String),

    #[error("Template index {0} out of range")]
    TemplateIndexOutOfRange(usize),

    #[error("Assumption index {index} out of range for partner '{partner_id}'")]
    AssumptionIndexOutOfRange { partner_id: String, index: usize },

    #[error("State file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StateError {
    /// Error class reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            StateError::PartnerNotFound(_) | StateError::EventNotFound(_) => "not_found",
            StateError::DuplicatePartner(_)
            | StateError::SelfPartnerProtected
            | StateError::TemplateIndexOutOfRange(_)
            | StateError::AssumptionIndexOutOfRange { .. } => "validation",
            StateError::Io(_) | StateError::Serde(_) => "internal",
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

fn same_handle(a: &str, b: &str) -> bool {
    a.trim_start_matches('@')
        .eq_ignore_ascii_case(b.trim_start_matches('@'))
}

fn update_partner<F>(mut state: AppState, partner_id: &str, f: F) -> AppState
where
    F: FnOnce(&mut Partner),
{
    if let Some(p) = state.partners.iter_mut().find(|p| p.id == partner_id) {
        f(p);
    }
    state
}

fn update_event<F>(mut state: AppState, event_id: &str, f: F) -> AppState
where
    F: FnOnce(&mut ScheduleEvent),
{
    if let Some(e) = state.schedule.iter_mut().find(|e| e.id == event_id) {
        f(e);
    }
    state
}

/// Pure transition. Actions that target missing records, add a duplicate
/// partner, or remove the self partner return the state unchanged.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut state = state.clone();
    match action {
        Action::AddPartner { partner } => {
            if state.partner(&partner.id).is_none() {
                state.partners.push(partner);
            }
            state
        }
        Action::RemovePartner { partner_id } => {
            if partner_id != SELF_PARTNER_ID {
                state.partners.retain(|p| p.id != partner_id);
            }
            state
        }
        Action::UpdatePartner {
            partner_id,
            name,
            color,
            weight,
            twitter,
        } => update_partner(state, &partner_id, |p| {
            if let Some(name) = name {
                p.name = name;
            }
            if let Some(color) = color {
                p.color = color;
            }
            if let Some(weight) = weight {
                p.weight = weight;
            }
            if let Some(twitter) = twitter {
                p.twitter = Some(twitter);
            }
        }),
        Action::SetPartnerAssumptions {
            partner_id,
            assumptions,
        } => update_partner(state, &partner_id, |p| p.assumptions = assumptions),
        Action::AddPartnerAssumption {
            partner_id,
            assumption,
        } => update_partner(state, &partner_id, |p| p.assumptions.push(assumption)),
        Action::AddPartnerAssumptions {
            partner_id,
            assumptions,
        } => update_partner(state, &partner_id, |p| p.assumptions.extend(assumptions)),
        Action::RemovePartnerAssumption { partner_id, index } => {
            update_partner(state, &partner_id, |p| {
                if index < p.assumptions.len() {
                    p.assumptions.remove(index);
                }
            })
        }
        Action::SetSchedule { events } => {
            state.schedule = events;
            state
        }
        Action::UpdatePreferences {
            content_types,
            time_slots,
        } => {
            if let Some(content_types) = content_types {
                state.preferences.content_types = content_types;
            }
            if let Some(time_slots) = time_slots {
                state.preferences.time_slots = time_slots;
            }
            state
        }
        Action::SetTemplates { templates } => {
            state.templates = templates;
            state
        }
        Action::AddTemplate { template } => {
            state.templates.push(template);
            state
        }
        Action::UpdateTemplate { index, template } => {
            if let Some(slot) = state.templates.get_mut(index) {
                *slot = template;
            }
            state
        }
        Action::UpdateEventGeneratedContent {
            event_id,
            content,
            selected_idea,
        } => update_event(state, &event_id, |e| {
            e.generated_content = Some(content);
            e.is_approved = false;
            if selected_idea.is_some() {
                e.selected_idea = selected_idea;
            }
        }),
        Action::SetEventIdeas { event_id, ideas } => {
            update_event(state, &event_id, |e| e.ideas = ideas)
        }
        Action::SelectEventIdea { event_id, idea } => {
            update_event(state, &event_id, |e| e.selected_idea = idea)
        }
        Action::ApproveEventContent { event_id } => {
            update_event(state, &event_id, |e| e.is_approved = true)
        }
        Action::UnapproveEventContent { event_id } => {
            update_event(state, &event_id, |e| e.is_approved = false)
        }
        Action::SetEventDraft { event_id, draft_id } => {
            update_event(state, &event_id, |e| e.draft_id = Some(draft_id))
        }
        Action::SyncPartnerWeights { weights } => {
            for partner in state.partners.iter_mut() {
                let Some(handle) = partner.twitter.as_deref() else {
                    continue;
                };
                if let Some(w) = weights.iter().find(|w| same_handle(&w.twitter, handle)) {
                    partner.weight = w.weight;
                }
            }
            state
        }
    }
}

/// Reject actions that `reduce` would silently ignore.
pub fn validate(state: &AppState, action: &Action) -> Result<(), StateError> {
    let require_partner = |id: &str| {
        state
            .partner(id)
            .map(|_| ())
            .ok_or_else(|| StateError::PartnerNotFound(id.to_string()))
    };
    let require_event = |id: &str| {
        state
            .event(id)
            .map(|_| ())
            .ok_or_else(|| StateError::EventNotFound(id.to_string()))
    };

    match action {
        Action::AddPartner { partner } => {
            if state.partner(&partner.id).is_some() {
                return Err(StateError::DuplicatePartner(partner.id.clone()));
            }
            Ok(())
        }
        Action::RemovePartner { partner_id } => {
            if partner_id == SELF_PARTNER_ID {
                return Err(StateError::SelfPartnerProtected);
            }
            require_partner(partner_id)
        }
        Action::UpdatePartner { partner_id, .. }
        | Action::SetPartnerAssumptions { partner_id, .. }
        | Action::AddPartnerAssumption { partner_id, .. }
        | Action::AddPartnerAssumptions { partner_id, .. } => require_partner(partner_id),
        Action::RemovePartnerAssumption { partner_id, index } => {
            let partner = state
                .partner(partner_id)
                .ok_or_else(|| StateError::PartnerNotFound(partner_id.clone()))?;
            if *index >= partner.assumptions.len() {
                return Err(StateError::AssumptionIndexOutOfRange {
                    partner_id: partner_id.clone(),
                    index: *index,
                });
            }
            Ok(())
        }
        Action::UpdateTemplate { index, .. } => {
            if *index >= state.templates.len() {
                return Err(StateError::TemplateIndexOutOfRange(*index));
            }
            Ok(())
        }
        Action::UpdateEventGeneratedContent { event_id, .. }
        | Action::SetEventIdeas { event_id, .. }
        | Action::SelectEventIdea { event_id, .. }
        | Action::ApproveEventContent { event_id }
        | Action::UnapproveEventContent { event_id }
        | Action::SetEventDraft { event_id, .. } => require_event(event_id),
        Action::SetSchedule { .. }
        | Action::UpdatePreferences { .. }
        | Action::SetTemplates { .. }
        | Action::AddTemplate { .. }
        | Action::SyncPartnerWeights { .. } => Ok(()),
    }
}

// ============================================================================
// StateStore
// ============================================================================

pub struct StateStore {
    state: RwLock<AppState>,
    path: Option<PathBuf>,
}

impl StateStore {
    /// A store that never touches disk.
    pub fn in_memory(state: AppState) -> Self {
        Self {
            state: RwLock::new(state),
            path: None,
        }
    }

    /// Load from `path`, or start from the initial state when the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<AppState>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No state file; starting from initial state");
                AppState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }

    pub async fn event(&self, event_id: &str) -> Result<ScheduleEvent, StateError> {
        self.state
            .read()
            .await
            .event(event_id)
            .cloned()
            .ok_or_else(|| StateError::EventNotFound(event_id.to_string()))
    }

    pub async fn partner(&self, partner_id: &str) -> Result<Partner, StateError> {
        self.state
            .read()
            .await
            .partner(partner_id)
            .cloned()
            .ok_or_else(|| StateError::PartnerNotFound(partner_id.to_string()))
    }

    /// Validate, reduce, persist, then publish. On any error the state is unchanged.
    pub async fn dispatch(&self, action: Action) -> Result<AppState, StateError> {
        let mut guard = self.state.write().await;
        validate(&guard, &action)?;

        let name = action.name();
        let next = reduce(&guard, action);
        if let Some(path) = &self.path {
            save(path, &next).await?;
        }
        *guard = next.clone();

        tracing::debug!(action = name, "State action applied");
        Ok(next)
    }
}

/// Write via a sibling temp file and rename so a crash never leaves half a file.
async fn save(path: &Path, state: &AppState) -> Result<(), StateError> {
    let body = serde_json::to_vec_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

// ============================================================================
// Built-in templates
// ============================================================================

const BUILT_IN_TEMPLATES: &[(&str, &str)] = &[
    (
        "Partnership Announcement",
        "Context: Official announcement of a new collaboration
Guidance:
- State the names of the partnering entities
- Mention the specific area of blockchain they're collaborating in
- Include the official announcement date
- Suggest where to find more information (e.g., official website)",
    ),
    (
        "Technical Integration",
        "Context: Combining specific technologies or features
Guidance:
- Name the exact technologies or features being integrated
- State the primary purpose of the integration
- Mention any immediate, measurable outcomes if available
- Indicate where technical details can be found",
    ),
    (
        "Product Launch",
        "Context: Releasing a new product or service from the partnership
Guidance:
- Provide the official name of the new product/service
- State its primary function
- Mention the launch date
- Indicate where users can access or learn about the product",
    ),
    (
        "Event Announcement",
        "Context: Upcoming event related to the partnership
Guidance:
- State the event name, type (e.g., webinar, conference), and date
- Mention the main topic or purpose of the event
- Provide information on how to participate or register
- Include any notable speakers or presentations if confirmed",
    ),
    (
        "Milestone Achievement",
        "Context: Reaching a significant, measurable goal
Guidance:
- State the specific milestone achieved (e.g., number of transactions, users)
- Provide the exact figure or statistic
- Mention the timeframe in which this was achieved
- Indicate where verification or more details can be found",
    ),
    (
        "Protocol Update",
        "Context: Changes or improvements to the blockchain protocol
Guidance:
- Name the specific protocol being updated
- State the nature of the update (e.g., security patch, performance improvement)
- Mention the version number or update identifier
- Indicate where the full changelog or documentation is available",
    ),
    (
        "Community Initiative",
        "Context: Launch of a program for the blockchain community
Guidance:
- Name the specific initiative (e.g., grant program, educational series)
- State its primary objective
- Mention the start date or application deadline if applicable
- Provide information on how community members can participate",
    ),
    (
        "Research Publication",
        "Context: Release of a research paper or whitepaper
Guidance:
- Provide the title of the publication
- State the main topic or finding
- Mention the authors or institutions involved
- Indicate where the full paper can be accessed",
    ),
    (
        "Governance Update",
        "Context: Changes to the governance model or voting system
Guidance:
- State the specific aspect of governance being updated
- Mention any key changes in the process
- Provide the implementation date
- Indicate where detailed information about the changes can be found",
    ),
    (
        "Partnership Metric",
        "Context: Sharing a key performance indicator of the partnership
Guidance:
- State the specific metric being shared (e.g., transaction volume, network growth)
- Provide the exact figure or percentage
- Mention the timeframe this metric covers
- Indicate the source of this data or where more information can be found",
    ),
];

pub fn default_templates() -> Vec<ContentTemplate> {
    BUILT_IN_TEMPLATES
        .iter()
        .map(|(title, content)| ContentTemplate {
            title: title.to_string(),
            content: content.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn idea(title: &str) -> Idea {
        Idea {
            title: title.to_string(),
            template: "Product Launch".to_string(),
            topic: "launch".to_string(),
            relevance: 0.8,
            brief: "brief".to_string(),
        }
    }

    fn state_with_event() -> AppState {
        let mut state = AppState::default();
        let partner = Partner::new("acme", "Acme");
        state.partners.push(Partner::new(SELF_PARTNER_ID, "Us"));
        state.partners.push(partner.clone());
        state.schedule.push(ScheduleEvent::new(
            "evt-1",
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            partner,
            "Tweet",
            "morning",
        ));
        state
    }

    #[test]
    fn test_initial_state_has_ten_templates() {
        let state = AppState::default();
        assert_eq!(state.templates.len(), 10);
        assert_eq!(state.templates[0].title, "Partnership Announcement");
        assert_eq!(state.templates[9].title, "Partnership Metric");
        assert_eq!(state.preferences.content_types, vec!["Tweet", "Blog"]);
    }

    #[test]
    fn test_reduce_does_not_mutate_input() {
        let state = state_with_event();
        let before = state.clone();
        let next = reduce(
            &state,
            Action::AddPartner {
                partner: Partner::new("globex", "Globex"),
            },
        );
        assert_eq!(state, before);
        assert_eq!(next.partners.len(), 3);
    }

    #[test]
    fn test_self_partner_cannot_be_removed_or_duplicated() {
        let state = state_with_event();
        let next = reduce(
            &state,
            Action::RemovePartner {
                partner_id: SELF_PARTNER_ID.into(),
            },
        );
        assert!(next.partner(SELF_PARTNER_ID).is_some());

        let next = reduce(
            &state,
            Action::AddPartner {
                partner: Partner::new(SELF_PARTNER_ID, "Again"),
            },
        );
        assert_eq!(next.partners.iter().filter(|p| p.is_self()).count(), 1);

        assert!(matches!(
            validate(
                &state,
                &Action::RemovePartner {
                    partner_id: SELF_PARTNER_ID.into()
                }
            ),
            Err(StateError::SelfPartnerProtected)
        ));
    }

    #[test]
    fn test_regenerated_content_resets_approval() {
        let state = state_with_event();
        let approved = reduce(
            &state,
            Action::ApproveEventContent {
                event_id: "evt-1".into(),
            },
        );
        assert!(approved.event("evt-1").unwrap().is_approved);

        let regenerated = reduce(
            &approved,
            Action::UpdateEventGeneratedContent {
                event_id: "evt-1".into(),
                content: "fresh copy".into(),
                selected_idea: None,
            },
        );
        let event = regenerated.event("evt-1").unwrap();
        assert!(!event.is_approved);
        assert_eq!(event.generated_content.as_deref(), Some("fresh copy"));
    }

    #[test]
    fn test_generated_content_keeps_existing_idea_when_none_given() {
        let state = reduce(
            &state_with_event(),
            Action::SelectEventIdea {
                event_id: "evt-1".into(),
                idea: Some(idea("kept")),
            },
        );
        let next = reduce(
            &state,
            Action::UpdateEventGeneratedContent {
                event_id: "evt-1".into(),
                content: "copy".into(),
                selected_idea: None,
            },
        );
        assert_eq!(
            next.event("evt-1").unwrap().selected_idea.as_ref().unwrap().title,
            "kept"
        );
    }

    #[test]
    fn test_assumption_actions() {
        let state = state_with_event();
        let state = reduce(
            &state,
            Action::AddPartnerAssumptions {
                partner_id: "acme".into(),
                assumptions: vec![Assumption::new("a"), Assumption::new("b")],
            },
        );
        let state = reduce(
            &state,
            Action::AddPartnerAssumption {
                partner_id: "acme".into(),
                assumption: Assumption::new("c"),
            },
        );
        let state = reduce(
            &state,
            Action::RemovePartnerAssumption {
                partner_id: "acme".into(),
                index: 1,
            },
        );
        let texts: Vec<_> = state
            .partner("acme")
            .unwrap()
            .assumptions
            .iter()
            .map(|a| a.text.as_str())
            .collect();
        assert_eq!(texts, vec!["a", "c"]);

        assert!(matches!(
            validate(
                &state,
                &Action::RemovePartnerAssumption {
                    partner_id: "acme".into(),
                    index: 5
                }
            ),
            Err(StateError::AssumptionIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_sync_partner_weights_matches_handles_case_insensitively() {
        let mut state = state_with_event();
        state.partners[1].twitter = Some("AcmeHQ".into());
        let next = reduce(
            &state,
            Action::SyncPartnerWeights {
                weights: vec![PartnerWeight {
                    twitter: "@acmehq".into(),
                    weight: 7,
                }],
            },
        );
        assert_eq!(next.partner("acme").unwrap().weight, 7);
        assert_eq!(next.partner(SELF_PARTNER_ID).unwrap().weight, 1);
    }

    #[test]
    fn test_action_wire_format_is_tagged() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "type": "approve_event_content",
            "event_id": "evt-1"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::ApproveEventContent {
                event_id: "evt-1".into()
            }
        );
    }

    #[test]
    fn test_partial_preferences_are_filled_on_decode() {
        let state: AppState = serde_json::from_value(serde_json::json!({
            "partners": [],
            "preferences": { "content_types": ["Thread"] }
        }))
        .unwrap();
        assert_eq!(state.preferences.content_types, vec!["Thread"]);
        assert_eq!(state.preferences.time_slots.len(), 3);
        assert_eq!(state.templates.len(), 10);
    }

    #[tokio::test]
    async fn test_store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::load(&path).await.unwrap();
        store
            .dispatch(Action::AddPartner {
                partner: Partner::new("acme", "Acme"),
            })
            .await
            .unwrap();

        let reloaded = StateStore::load(&path).await.unwrap();
        assert_eq!(reloaded.partner("acme").await.unwrap().name, "Acme");
    }

    #[tokio::test]
    async fn test_store_rejects_unknown_event_and_keeps_state() {
        let store = StateStore::in_memory(state_with_event());
        let before = store.snapshot().await;

        let err = store
            .dispatch(Action::SetEventIdeas {
                event_id: "missing".into(),
                ideas: vec![idea("x")],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::EventNotFound(_)));
        assert_eq!(store.snapshot().await, before);
    }
}
