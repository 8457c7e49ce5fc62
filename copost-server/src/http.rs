//! Copost HTTP REST API
//!
//! Axum server exposing the same operations as the Unix socket. Every
//! endpoint is a thin handler over an inner function that returns
//! `(StatusCode, serde_json::Value)`, so the logic is testable without the
//! axum dispatch machinery.
//!
//! Error kinds map to status codes: `validation` 400, `not_found` 404,
//! `format` 422, `provider` 502, anything else 500.
//!
//! Endpoints:
//! - GET    /health
//! - GET    /version
//! - POST   /documents
//! - GET    /partners/:id/documents
//! - DELETE /documents/:id
//! - POST   /tweets/import
//! - POST   /tweets/parse
//! - POST   /search
//! - POST   /events/:id/ideas
//! - POST   /events/:id/ideas/refine
//! - POST   /events/:id/content
//! - POST   /events/:id/approve
//! - POST   /events/:id/publish
//! - POST   /partners/:id/assumptions
//! - GET    /state
//! - POST   /state/actions

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use copost_core::ipc::{
    ContentRequest, CopostRequest, CopostResponse, IdeaRequest, PublishOptions, RefineRequest,
    PROTOCOL_VERSION,
};
use copost_core::models::{Sources, TweetRecord};
use copost_core::state::Action;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router;
use crate::Services;

/// Build the Axum router with all endpoints
pub fn build_router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/documents", post(ingest_document_handler))
        .route("/documents/:id", delete(delete_document_handler))
        .route("/partners/:id/documents", get(list_documents_handler))
        .route("/partners/:id/assumptions", post(assumptions_handler))
        .route("/tweets/import", post(import_tweets_handler))
        .route("/tweets/parse", post(parse_timeline_handler))
        .route("/search", post(search_handler))
        .route("/events/:id/ideas", post(ideas_handler))
        .route("/events/:id/ideas/refine", post(refine_handler))
        .route("/events/:id/content", post(content_handler))
        .route("/events/:id/approve", post(approve_handler))
        .route("/events/:id/publish", post(publish_handler))
        .route("/state", get(state_handler))
        .route("/state/actions", post(dispatch_handler))
        .with_state(services)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    services: Arc<Services>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        services.config.http.host, services.config.http.port
    );

    let app = build_router(services);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Copost HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub partner_id: Option<String>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sources: Sources,
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    pub partner_id: String,
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub partner_id: String,
    pub records: Vec<TweetRecord>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineRequest {
    pub text: String,
    #[serde(default)]
    pub partner_id: Option<String>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": message.into(),
        "status": "error",
    })
}

/// Run one request through the IPC router and map the result to HTTP.
pub async fn route_inner(
    services: &Services,
    request: CopostRequest,
) -> (StatusCode, serde_json::Value) {
    response_to_http(router::handle_request(request, services).await)
}

/// Inner health check: store status plus provider names.
pub async fn health_inner(services: &Services) -> (StatusCode, serde_json::Value) {
    let response = router::handle_request(CopostRequest::Health, services).await;
    match response.data {
        Some(mut data) if response.status == "ok" => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("version".to_string(), serde_json::json!(PROTOCOL_VERSION));
                obj.insert(
                    "socket".to_string(),
                    serde_json::json!(services.config.service.socket_path),
                );
            }
            (StatusCode::OK, data)
        }
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": response.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": PROTOCOL_VERSION,
        "protocol": "copost/1",
    })
}

/// Inner search: validates the request body before embedding anything.
pub async fn search_inner(
    services: &Services,
    req: SearchRequest,
) -> (StatusCode, serde_json::Value) {
    let query = match req.query {
        Some(q) if !q.trim().is_empty() => q,
        _ => return (StatusCode::BAD_REQUEST, error_body("query field is required")),
    };
    let partner_id = match req.partner_id {
        Some(p) if !p.trim().is_empty() => p,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                error_body("partner_id field is required"),
            )
        }
    };

    let start = Instant::now();
    let (status, mut body) = route_inner(
        services,
        CopostRequest::Search {
            query,
            partner_id,
            limit: req.limit,
            sources: req.sources,
        },
    )
    .await;

    if status == StatusCode::OK {
        if let Some(obj) = body.as_object_mut() {
            let took_ms = start.elapsed().as_millis() as u64;
            obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
        }
    }
    (status, body)
}

pub async fn ingest_document_inner(
    services: &Services,
    req: DocumentRequest,
) -> (StatusCode, serde_json::Value) {
    let (status, body) = route_inner(
        services,
        CopostRequest::IngestDocument {
            partner_id: req.partner_id,
            filename: req.filename,
            text: req.text,
        },
    )
    .await;
    if status == StatusCode::OK {
        (StatusCode::CREATED, body)
    } else {
        (status, body)
    }
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(services): State<Arc<Services>>) -> impl IntoResponse {
    let (status, body) = health_inner(&services).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn search_handler(
    State(services): State<Arc<Services>>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let (status, body) = search_inner(&services, req).await;
    (status, Json(body))
}

pub async fn ingest_document_handler(
    State(services): State<Arc<Services>>,
    Json(req): Json<DocumentRequest>,
) -> impl IntoResponse {
    let (status, body) = ingest_document_inner(&services, req).await;
    (status, Json(body))
}

pub async fn delete_document_handler(
    State(services): State<Arc<Services>>,
    Path(document_id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = route_inner(&services, CopostRequest::DeleteDocument { document_id }).await;
    (status, Json(body))
}

pub async fn list_documents_handler(
    State(services): State<Arc<Services>>,
    Path(partner_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = route_inner(&services, CopostRequest::ListDocuments { partner_id }).await;
    (status, Json(body))
}

pub async fn import_tweets_handler(
    State(services): State<Arc<Services>>,
    Json(req): Json<ImportRequest>,
) -> impl IntoResponse {
    let request = CopostRequest::ImportTweets {
        partner_id: req.partner_id,
        records: req.records,
    };
    let (status, body) = route_inner(&services, request).await;
    (status, Json(body))
}

pub async fn parse_timeline_handler(
    State(services): State<Arc<Services>>,
    Json(req): Json<TimelineRequest>,
) -> impl IntoResponse {
    let request = CopostRequest::ParseTimeline {
        text: req.text,
        partner_id: req.partner_id,
    };
    let (status, body) = route_inner(&services, request).await;
    (status, Json(body))
}

pub async fn ideas_handler(
    State(services): State<Arc<Services>>,
    Path(event_id): Path<String>,
    body: Option<Json<IdeaRequest>>,
) -> impl IntoResponse {
    let request = CopostRequest::GenerateIdeas {
        event_id,
        request: body.map(|Json(r)| r).unwrap_or_default(),
    };
    let (status, body) = route_inner(&services, request).await;
    (status, Json(body))
}

pub async fn refine_handler(
    State(services): State<Arc<Services>>,
    Path(event_id): Path<String>,
    Json(request): Json<RefineRequest>,
) -> impl IntoResponse {
    let (status, body) = route_inner(&services, CopostRequest::RefineIdea { event_id, request }).await;
    (status, Json(body))
}

pub async fn content_handler(
    State(services): State<Arc<Services>>,
    Path(event_id): Path<String>,
    Json(request): Json<ContentRequest>,
) -> impl IntoResponse {
    let (status, body) =
        route_inner(&services, CopostRequest::GenerateContent { event_id, request }).await;
    (status, Json(body))
}

pub async fn approve_handler(
    State(services): State<Arc<Services>>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = route_inner(&services, CopostRequest::ApproveEvent { event_id }).await;
    (status, Json(body))
}

pub async fn publish_handler(
    State(services): State<Arc<Services>>,
    Path(event_id): Path<String>,
    body: Option<Json<PublishOptions>>,
) -> impl IntoResponse {
    let request = CopostRequest::PublishEvent {
        event_id,
        options: body.map(|Json(o)| o).unwrap_or_default(),
    };
    let (status, body) = route_inner(&services, request).await;
    (status, Json(body))
}

pub async fn assumptions_handler(
    State(services): State<Arc<Services>>,
    Path(partner_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) =
        route_inner(&services, CopostRequest::GenerateAssumptions { partner_id }).await;
    (status, Json(body))
}

pub async fn state_handler(State(services): State<Arc<Services>>) -> impl IntoResponse {
    let (status, body) = route_inner(&services, CopostRequest::GetState).await;
    (status, Json(body))
}

pub async fn dispatch_handler(
    State(services): State<Arc<Services>>,
    Json(action): Json<Action>,
) -> impl IntoResponse {
    let (status, body) = route_inner(&services, CopostRequest::Dispatch { action }).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn status_for_kind(kind: Option<&str>) -> StatusCode {
    match kind {
        Some("validation") => StatusCode::BAD_REQUEST,
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("format") => StatusCode::UNPROCESSABLE_ENTITY,
        Some("provider") => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an IPC `CopostResponse` into an HTTP status and body.
pub fn response_to_http(response: CopostResponse) -> (StatusCode, serde_json::Value) {
    if response.is_ok() {
        return (
            StatusCode::OK,
            response.data.unwrap_or(serde_json::json!({})),
        );
    }

    let status = status_for_kind(response.kind.as_deref());
    let mut body = error_body(
        response
            .error
            .unwrap_or_else(|| "unknown error".to_string()),
    );
    if let (Some(obj), Some(kind)) = (body.as_object_mut(), response.kind) {
        obj.insert("kind".to_string(), serde_json::json!(kind));
    }
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // TEST 1: version_inner is pure and returns correct fields
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string());
        assert_eq!(v["protocol"], "copost/1");
    }

    // ========================================================================
    // TEST 2: response_to_http: ok response extracts data
    // ========================================================================
    #[test]
    fn test_response_to_http_ok() {
        let resp = CopostResponse::ok(serde_json::json!({"results": [], "count": 0}));
        let (status, data) = response_to_http(resp);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["count"], 0);
    }

    // ========================================================================
    // TEST 3: error kinds map to status codes
    // ========================================================================
    #[test]
    fn test_error_kinds_map_to_status() {
        let cases = [
            ("validation", StatusCode::BAD_REQUEST),
            ("not_found", StatusCode::NOT_FOUND),
            ("format", StatusCode::UNPROCESSABLE_ENTITY),
            ("provider", StatusCode::BAD_GATEWAY),
            ("internal", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, expected) in cases {
            let (status, body) = response_to_http(CopostResponse::err_kind(kind, "boom"));
            assert_eq!(status, expected, "kind {}", kind);
            assert_eq!(body["error"], "boom");
            assert_eq!(body["kind"], kind);
        }
    }

    // ========================================================================
    // TEST 4: ok with no data returns empty object
    // ========================================================================
    #[test]
    fn test_response_to_http_ok_no_data() {
        let mut resp = CopostResponse::ok(serde_json::json!({}));
        resp.data = None;
        let (_, body) = response_to_http(resp);
        assert!(body.is_object());
    }

    // ========================================================================
    // TEST 5: error with no message returns fallback
    // ========================================================================
    #[test]
    fn test_response_to_http_error_no_message() {
        let mut resp = CopostResponse::err("x");
        resp.error = None;
        let (status, body) = response_to_http(resp);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "unknown error");
    }
}
