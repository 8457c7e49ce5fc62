//! Generation subsystem: retrieval-augmented content, ideas and assumptions
//!
//! Every operation reads the event or partner from the state store, gathers
//! context, calls the chat backend, and on success dispatches one action.
//! JSON-mode replies are decoded strictly: a reply that does not match the
//! expected shape is a `GenerationError::Format` and nothing is dispatched.

use copost_core::chat::{ChatError, ChatRequest};
use copost_core::ipc::{ContentRequest, IdeaRequest, RefineRequest};
use copost_core::models::{
    Assumption, Idea, RefinedIdea, RetrievalResult, ScheduleEvent, Sources, SELF_PARTNER_ID,
};
use copost_core::state::{Action, StateError};
use serde_json::Value;
use thiserror::Error;

use crate::subsystems::prompts::{self, ContentPrompt};
use crate::subsystems::retrieve::{retrieve, RetrievalError};
use crate::Services;

/// Recent tweets used as partner activity when the caller supplies none.
const ACTIVITY_TWEETS: i64 = 10;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("No context found for partner '{0}'")]
    NoContext(String),

    #[error("Model reply has the wrong format: {0}")]
    Format(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("Chat completion failed: {0}")]
    Chat(#[from] ChatError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidInput(_)
            | GenerationError::TemplateNotFound(_)
            | GenerationError::NoContext(_) => "validation",
            GenerationError::Format(_) => "format",
            GenerationError::Retrieval(e) => e.kind(),
            GenerationError::Chat(_) => "provider",
            GenerationError::State(e) => e.kind(),
        }
    }
}

/// Completion budget for a target length in words.
pub fn max_tokens_for(words: u32, tokens_per_word: f64) -> u32 {
    (f64::from(words) * tokens_per_word).floor() as u32
}

async fn context_for(
    services: &Services,
    query: &str,
    partner_id: &str,
) -> Result<Vec<RetrievalResult>, GenerationError> {
    let results = retrieve(
        services.embedder.as_ref(),
        services.store.as_ref(),
        &services.config.retrieval,
        query,
        partner_id,
        None,
        Sources::Documents,
    )
    .await?;
    Ok(results)
}

/// Caller-supplied activity, or the partner's stored tweets.
async fn partner_activity(
    services: &Services,
    event: &ScheduleEvent,
    supplied: Option<&str>,
) -> Result<Option<String>, GenerationError> {
    if let Some(text) = supplied.filter(|t| !t.trim().is_empty()) {
        return Ok(Some(text.to_string()));
    }
    let tweets = services
        .store
        .recent_tweets(&event.partner.id, ACTIVITY_TWEETS)
        .await
        .map_err(RetrievalError::from)?;
    if tweets.is_empty() {
        return Ok(None);
    }
    Ok(Some(prompts::format_activity(&tweets)))
}

fn chat_request(services: &Services, system: &str, user: String, max_tokens: u32) -> ChatRequest {
    ChatRequest::new(system, user, max_tokens).with_temperature(services.config.chat.temperature)
}

// ============================================================================
// Content
// ============================================================================

/// Draft, reflect, and store the final text on the event (approval resets).
pub async fn generate_content(
    services: &Services,
    event_id: &str,
    request: &ContentRequest,
) -> Result<String, GenerationError> {
    if request.word_count == 0 {
        return Err(GenerationError::InvalidInput(
            "word_count must be greater than zero".to_string(),
        ));
    }

    let event = services.state.event(event_id).await?;
    let template = services
        .state
        .snapshot()
        .await
        .template(&request.template)
        .cloned()
        .ok_or_else(|| GenerationError::TemplateNotFound(request.template.clone()))?;

    let self_context = context_for(services, &event.content_type, SELF_PARTNER_ID).await?;
    let partner_query = format!("{} {}", event.content_type, event.partner.name);
    let partner_context = context_for(services, &partner_query, &event.partner.id).await?;
    let activity = partner_activity(services, &event, request.additional_context.as_deref()).await?;

    let max_tokens = max_tokens_for(request.word_count, services.config.generation.tokens_per_word);

    let prompt = prompts::content_prompt(&ContentPrompt {
        event: &event,
        template: &template,
        self_context: &self_context,
        partner_context: &partner_context,
        activity: activity.as_deref(),
        user_context: request.user_context.as_deref(),
        idea: request.idea.as_ref(),
        word_count: request.word_count,
    });

    tracing::info!(
        event_id = event_id,
        partner_id = %event.partner.id,
        template = %template.title,
        self_hits = self_context.len(),
        partner_hits = partner_context.len(),
        max_tokens = max_tokens,
        "Generating content"
    );

    let draft = services
        .chat
        .complete(&chat_request(services, prompts::CONTENT_SYSTEM, prompt, max_tokens))
        .await?;

    let reflection = prompts::reflection_prompt(&event, draft.trim(), &self_context, request.word_count);
    let content = services
        .chat
        .complete(&chat_request(services, prompts::CONTENT_SYSTEM, reflection, max_tokens))
        .await?
        .trim()
        .to_string();

    services
        .state
        .dispatch(Action::UpdateEventGeneratedContent {
            event_id: event_id.to_string(),
            content: content.clone(),
            selected_idea: request.idea.clone(),
        })
        .await?;

    tracing::info!(event_id = event_id, chars = content.len(), "Content generated");
    Ok(content)
}

// ============================================================================
// Ideas
// ============================================================================

fn format_error(what: &str, detail: impl std::fmt::Display) -> GenerationError {
    GenerationError::Format(format!("{}: {}", what, detail))
}

fn check_relevance(idea: &Idea, index: usize) -> Result<(), GenerationError> {
    if idea.relevance.is_finite() && (0.0..=1.0).contains(&idea.relevance) {
        Ok(())
    } else {
        Err(format_error(
            &format!("idea {}", index),
            format!("relevance {} is outside [0, 1]", idea.relevance),
        ))
    }
}

/// Decode `[ {idea}, ... ]` or `{ "ideas": [ {idea}, ... ] }`.
pub fn decode_ideas(raw: &str) -> Result<Vec<Idea>, GenerationError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| format_error("not JSON", e))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("ideas") {
            Some(Value::Array(items)) => items,
            _ => return Err(format_error("ideas", "expected an `ideas` array")),
        },
        _ => return Err(format_error("ideas", "expected an array or object")),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let idea: Idea = serde_json::from_value(item)
                .map_err(|e| format_error(&format!("idea {}", index), e))?;
            check_relevance(&idea, index)?;
            Ok(idea)
        })
        .collect()
}

/// Analyse partner activity, then ask for ideas and store them on the event.
pub async fn generate_ideas(
    services: &Services,
    event_id: &str,
    request: &IdeaRequest,
) -> Result<Vec<Idea>, GenerationError> {
    let event = services.state.event(event_id).await?;
    let activity = partner_activity(services, &event, request.additional_context.as_deref()).await?;

    let analysis = services
        .chat
        .complete(&chat_request(
            services,
            prompts::ANALYSIS_SYSTEM,
            prompts::analysis_prompt(activity.as_deref(), request.user_context.as_deref()),
            services.config.generation.analysis_max_tokens,
        ))
        .await?;

    let self_context = context_for(services, &event.content_type, SELF_PARTNER_ID).await?;
    let snapshot = services.state.snapshot().await;
    let titles: Vec<&str> = snapshot.templates.iter().map(|t| t.title.as_str()).collect();

    let raw = services
        .chat
        .complete(
            &chat_request(
                services,
                prompts::IDEAS_SYSTEM,
                prompts::ideas_prompt(
                    &event,
                    &titles,
                    analysis.trim(),
                    &self_context,
                    request.user_context.as_deref(),
                ),
                services.config.generation.ideas_max_tokens,
            )
            .json(),
        )
        .await?;

    let ideas = match decode_ideas(&raw) {
        Ok(ideas) => ideas,
        Err(e) => {
            tracing::warn!(event_id = event_id, error = %e, "Rejected idea reply");
            return Err(e);
        }
    };

    services
        .state
        .dispatch(Action::SetEventIdeas {
            event_id: event_id.to_string(),
            ideas: ideas.clone(),
        })
        .await?;

    tracing::info!(event_id = event_id, ideas = ideas.len(), "Ideas generated");
    Ok(ideas)
}

/// Decode one refined idea object.
pub fn decode_refined(raw: &str) -> Result<RefinedIdea, GenerationError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| format_error("not JSON", e))?;
    if !value.is_object() {
        return Err(format_error("refined idea", "expected an object"));
    }
    let refined: RefinedIdea =
        serde_json::from_value(value).map_err(|e| format_error("refined idea", e))?;
    check_relevance(&refined.idea, 0)?;
    Ok(refined)
}

/// Refine one idea with feedback and select it on the event.
pub async fn refine_idea(
    services: &Services,
    event_id: &str,
    request: &RefineRequest,
) -> Result<RefinedIdea, GenerationError> {
    let event = services.state.event(event_id).await?;

    let raw = services
        .chat
        .complete(
            &chat_request(
                services,
                prompts::REFINE_SYSTEM,
                prompts::refine_prompt(&event, &request.idea, request.context.as_deref()),
                services.config.generation.ideas_max_tokens,
            )
            .json(),
        )
        .await?;
    let refined = decode_refined(&raw)?;

    services
        .state
        .dispatch(Action::SelectEventIdea {
            event_id: event_id.to_string(),
            idea: Some(refined.idea.clone()),
        })
        .await?;

    tracing::info!(
        event_id = event_id,
        suggestions = refined.additional_suggestions.len(),
        "Idea refined"
    );
    Ok(refined)
}

// ============================================================================
// Assumptions
// ============================================================================

/// Decode `[string, ...]` or `{ "assumptions": [string, ...] }`. Blank entries are dropped.
pub fn decode_assumptions(raw: &str) -> Result<Vec<Assumption>, GenerationError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| format_error("not JSON", e))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("assumptions") {
            Some(Value::Array(items)) => items,
            _ => return Err(format_error("assumptions", "expected an `assumptions` array")),
        },
        _ => return Err(format_error("assumptions", "expected an array or object")),
    };

    let mut assumptions = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::String(text) if text.trim().is_empty() => {}
            Value::String(text) => assumptions.push(Assumption::new(text.trim())),
            other => {
                return Err(format_error(
                    &format!("assumption {}", index),
                    format!("expected a string, got {}", other),
                ))
            }
        }
    }
    Ok(assumptions)
}

/// Derive assumptions about a partner from its documents and store them.
pub async fn generate_assumptions(
    services: &Services,
    partner_id: &str,
) -> Result<Vec<Assumption>, GenerationError> {
    let partner = services.state.partner(partner_id).await?;
    let context = context_for(services, prompts::ASSUMPTIONS_QUERY, partner_id).await?;
    if context.is_empty() {
        return Err(GenerationError::NoContext(partner_id.to_string()));
    }

    let raw = services
        .chat
        .complete(
            &chat_request(
                services,
                prompts::ASSUMPTIONS_SYSTEM,
                prompts::assumptions_prompt(&partner.name, &context),
                services.config.generation.assumptions_max_tokens,
            )
            .json(),
        )
        .await?;
    let assumptions = decode_assumptions(&raw)?;

    services
        .state
        .dispatch(Action::SetPartnerAssumptions {
            partner_id: partner_id.to_string(),
            assumptions: assumptions.clone(),
        })
        .await?;

    tracing::info!(
        partner_id = partner_id,
        assumptions = assumptions.len(),
        "Assumptions generated"
    );
    Ok(assumptions)
}
