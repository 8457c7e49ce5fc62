use copost_core::ipc::{CopostRequest, CopostResponse};
use serde::Serialize;

use crate::subsystems::{drafts, generate, ingest, retrieve};
use crate::Services;

fn to_data<T: Serialize>(value: &T) -> CopostResponse {
    match serde_json::to_value(value) {
        Ok(v) => CopostResponse::ok(v),
        Err(e) => CopostResponse::err(format!("Failed to encode response: {}", e)),
    }
}

pub async fn handle_request(request: CopostRequest, services: &Services) -> CopostResponse {
    match request {
        CopostRequest::Ping => CopostResponse::pong(),
        CopostRequest::Health => match services.store.health().await {
            Ok(health) => CopostResponse::ok(serde_json::json!({
                "status": "healthy",
                "store": health,
                "embedding": services.embedder.name(),
                "chat": services.chat.name(),
            })),
            Err(e) => CopostResponse::err(format!("Health check failed: {}", e)),
        },
        CopostRequest::IngestDocument {
            partner_id,
            filename,
            text,
        } => match ingest::ingest(services, &partner_id, &filename, &text).await {
            Ok(report) => to_data(&report),
            Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
        },
        CopostRequest::DeleteDocument { document_id } => {
            match services.store.delete_document(document_id).await {
                Ok(true) => CopostResponse::ok(serde_json::json!({
                    "deleted": true,
                    "document_id": document_id,
                })),
                Ok(false) => CopostResponse::err_kind(
                    "not_found",
                    format!("Document {} not found", document_id),
                ),
                Err(e) => CopostResponse::err(e.to_string()),
            }
        }
        CopostRequest::ListDocuments { partner_id } => {
            match services.store.list_documents(&partner_id).await {
                Ok(documents) => {
                    let documents: Vec<_> = documents
                        .into_iter()
                        .map(|d| {
                            let complete = d.is_complete();
                            serde_json::json!({ "document": d, "complete": complete })
                        })
                        .collect();
                    CopostResponse::ok(serde_json::json!({
                        "partner_id": partner_id,
                        "count": documents.len(),
                        "documents": documents,
                    }))
                }
                Err(e) => CopostResponse::err(e.to_string()),
            }
        }
        CopostRequest::ImportTweets {
            partner_id,
            records,
        } => match ingest::import(services, &partner_id, &records).await {
            Ok(summary) => to_data(&summary),
            Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
        },
        CopostRequest::ParseTimeline { text, partner_id } => {
            match ingest::timeline(services, &text, partner_id.as_deref()).await {
                Ok(result) => to_data(&result),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::Search {
            query,
            partner_id,
            limit,
            sources,
        } => match retrieve::search(
            services.embedder.as_ref(),
            services.store.as_ref(),
            &services.config.retrieval,
            &query,
            &partner_id,
            limit,
            sources,
        )
        .await
        {
            Ok(response) => to_data(&response),
            Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
        },
        CopostRequest::GenerateIdeas { event_id, request } => {
            match generate::generate_ideas(services, &event_id, &request).await {
                Ok(ideas) => CopostResponse::ok(serde_json::json!({
                    "event_id": event_id,
                    "ideas": ideas,
                })),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::RefineIdea { event_id, request } => {
            match generate::refine_idea(services, &event_id, &request).await {
                Ok(refined) => to_data(&refined),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::GenerateContent { event_id, request } => {
            match generate::generate_content(services, &event_id, &request).await {
                Ok(content) => CopostResponse::ok(serde_json::json!({
                    "event_id": event_id,
                    "content": content,
                })),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::GenerateAssumptions { partner_id } => {
            match generate::generate_assumptions(services, &partner_id).await {
                Ok(assumptions) => CopostResponse::ok(serde_json::json!({
                    "partner_id": partner_id,
                    "assumptions": assumptions,
                })),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::ApproveEvent { event_id } => {
            match drafts::approve_event(services, &event_id).await {
                Ok(event) => to_data(&event),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::PublishEvent { event_id, options } => {
            match drafts::publish_event(services, &event_id, &options).await {
                Ok(draft_id) => CopostResponse::ok(serde_json::json!({
                    "event_id": event_id,
                    "draft_id": draft_id,
                })),
                Err(e) => CopostResponse::err_kind(e.kind(), e.to_string()),
            }
        }
        CopostRequest::Dispatch { action } => {
            let name = action.name();
            match services.state.dispatch(action).await {
                Ok(state) => to_data(&state),
                Err(e) => {
                    tracing::warn!(action = name, error = %e, "State action rejected");
                    CopostResponse::err_kind(e.kind(), e.to_string())
                }
            }
        }
        CopostRequest::GetState => to_data(&services.state.snapshot().await),
    }
}
