//! HTTP surface: the Pub/Sub push trigger and status polling.
//!
//! | Method | Path          | Body / response                                   |
//! |--------|---------------|---------------------------------------------------|
//! | POST   | `/`           | Pub/Sub push envelope; always `204`               |
//! | GET    | `/status/*id` | status record, or `{"status":"none","progress":0}` |
//! | GET    | `/health`     | `ok`                                              |
//!
//! The trigger endpoint never answers with an error status. Pub/Sub would
//! redeliver, and nobody reads the response anyway; outcomes are visible
//! only through the status record.

use crate::error::Jats2SiteError;
use crate::orchestrator::{JobOutcome, Orchestrator, TriggerRequest};
use crate::status::poll_view;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// State shared with the handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/", post(handle_push))
        .route("/status/*id", get(handle_status))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { orchestrator })
}

/// Bind `addr` and serve until the process ends.
pub async fn serve(addr: SocketAddr, orchestrator: Arc<Orchestrator>) -> Result<(), Jats2SiteError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Jats2SiteError::Internal(format!("cannot bind {addr}: {e}")))?;
    info!("convert-server: listening on {}", addr);
    axum::serve(listener, router(orchestrator))
        .await
        .map_err(|e| Jats2SiteError::Internal(format!("server error: {e}")))
}

/// Extract the trigger from a Pub/Sub push body.
///
/// ```json
/// { "message": { "attributes": { "target": "PMC10134778", "id": "PMC10134778" } } }
/// ```
pub fn parse_push(body: &[u8]) -> Result<TriggerRequest, Jats2SiteError> {
    let bad = |msg: &str| Jats2SiteError::BadRequest(msg.to_string());

    let envelope: Value = serde_json::from_slice(body)
        .ok()
        .filter(Value::is_object)
        .ok_or_else(|| bad("no Pub/Sub message received"))?;
    let message = envelope
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| bad("invalid Pub/Sub message format"))?;

    let attributes = message.get("attributes").cloned().unwrap_or(Value::Null);
    let request: TriggerRequest = if attributes.is_null() {
        TriggerRequest::default()
    } else {
        serde_json::from_value(attributes).map_err(|_| bad("invalid Pub/Sub message format"))?
    };
    match request.target.as_deref() {
        Some(t) if !t.trim().is_empty() => Ok(request),
        _ => Err(bad("no target in Pub/Sub message")),
    }
}

async fn handle_push(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let outcome = match parse_push(&body) {
        Ok(request) => state.orchestrator.handle(request).await,
        Err(Jats2SiteError::BadRequest(msg)) => {
            warn!("Bad Request: {}", msg);
            JobOutcome::BadRequest(msg)
        }
        Err(other) => JobOutcome::BadRequest(other.to_string()),
    };
    (StatusCode::NO_CONTENT, outcome.response_text())
}

async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.status(&id).await {
        Ok(record) => (StatusCode::OK, Json(poll_view(record.as_ref()))),
        Err(e) => {
            warn!("Status lookup for {} failed: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}
