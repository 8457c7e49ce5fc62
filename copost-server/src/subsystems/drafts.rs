//! Drafting subsystem: approval and hand-off to the drafting service
//!
//! `approve_event` requires generated content. `publish_event` requires an
//! approved event, posts the content to `{drafts.base_url}/upload-draft`, and
//! records the returned draft id on the event.
//!
//! The schedule time is taken from the event's time slot and snapped to the
//! nearest posting window (12:00, 14:00 or 17:00 UTC) on the event date.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use copost_core::config::DraftsConfig;
use copost_core::ipc::PublishOptions;
use copost_core::models::ScheduleEvent;
use copost_core::state::{Action, StateError};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::Services;

/// Posting windows, in hours.
const POSTING_HOURS: [u32; 3] = [12, 14, 17];

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Event '{0}' has no generated content to approve")]
    NoContent(String),

    #[error("Event '{0}' must be approved before publishing")]
    NotApproved(String),

    #[error("Drafting service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Drafting service error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Drafting service response has no draft id")]
    MissingId,

    #[error("No valid schedule time on {0}")]
    InvalidSchedule(NaiveDate),

    #[error(transparent)]
    State(#[from] StateError),
}

impl DraftError {
    pub fn kind(&self) -> &'static str {
        match self {
            DraftError::NoContent(_) | DraftError::NotApproved(_) | DraftError::InvalidSchedule(_) => {
                "validation"
            }
            DraftError::Http(_) | DraftError::Api { .. } | DraftError::MissingId => "provider",
            DraftError::State(e) => e.kind(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadDraft<'a> {
    content: &'a str,
    threadify: bool,
    share: bool,
    schedule_date: String,
    auto_retweet_enabled: bool,
    auto_plug_enabled: bool,
}

/// Client for the drafting service.
#[derive(Debug, Clone)]
pub struct DraftClient {
    client: Client,
    base_url: String,
}

impl DraftClient {
    pub fn new(config: &DraftsConfig) -> Result<Self, DraftError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upload one draft and return its id.
    pub async fn create_draft(
        &self,
        content: &str,
        schedule_date: DateTime<Utc>,
        options: &PublishOptions,
    ) -> Result<String, DraftError> {
        let url = format!("{}/upload-draft", self.base_url);
        let body = UploadDraft {
            content,
            threadify: options.threadify,
            share: options.share,
            schedule_date: schedule_date.to_rfc3339_opts(SecondsFormat::Millis, true),
            auto_retweet_enabled: options.auto_retweet_enabled,
            auto_plug_enabled: options.auto_plug_enabled,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DraftError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let data: serde_json::Value = response.json().await?;
        draft_id(&data).ok_or(DraftError::MissingId)
    }
}

/// The service answers with `{"id": ...}`; ids may be strings or numbers.
fn draft_id(data: &serde_json::Value) -> Option<String> {
    match data.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Nominal hour of a named time slot.
pub fn slot_hour(time_slot: &str) -> u32 {
    match time_slot.to_ascii_lowercase().as_str() {
        "morning" => 9,
        "afternoon" => 14,
        "evening" => 19,
        _ => 12,
    }
}

/// Nearest posting window to `hour`; ties go to the earlier window.
pub fn snap_hour(hour: u32) -> u32 {
    let mut best = POSTING_HOURS[0];
    for candidate in POSTING_HOURS.iter().copied().skip(1) {
        if candidate.abs_diff(hour) < best.abs_diff(hour) {
            best = candidate;
        }
    }
    best
}

pub fn schedule_time(date: NaiveDate, time_slot: &str) -> Option<DateTime<Utc>> {
    date.and_hms_opt(snap_hour(slot_hour(time_slot)), 0, 0)
        .map(|dt| dt.and_utc())
}

/// Mark an event's content as approved.
pub async fn approve_event(
    services: &Services,
    event_id: &str,
) -> Result<ScheduleEvent, DraftError> {
    let event = services.state.event(event_id).await?;
    let has_content = event
        .generated_content
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if !has_content {
        return Err(DraftError::NoContent(event_id.to_string()));
    }

    services
        .state
        .dispatch(Action::ApproveEventContent {
            event_id: event_id.to_string(),
        })
        .await?;

    tracing::info!(event_id = event_id, "Event content approved");
    Ok(services.state.event(event_id).await?)
}

/// Send an approved event to the drafting service and record the draft id.
pub async fn publish_event(
    services: &Services,
    event_id: &str,
    options: &PublishOptions,
) -> Result<String, DraftError> {
    let event = services.state.event(event_id).await?;
    let content = match (&event.generated_content, event.is_approved) {
        (Some(content), true) => content.clone(),
        _ => return Err(DraftError::NotApproved(event_id.to_string())),
    };

    let schedule = schedule_time(event.date, &event.time_slot)
        .ok_or(DraftError::InvalidSchedule(event.date))?;

    let draft_id = services
        .drafts
        .create_draft(&content, schedule, options)
        .await?;

    services
        .state
        .dispatch(Action::SetEventDraft {
            event_id: event_id.to_string(),
            draft_id: draft_id.clone(),
        })
        .await?;

    tracing::info!(
        event_id = event_id,
        draft_id = %draft_id,
        schedule = %schedule,
        "Draft created"
    );
    Ok(draft_id)
}
