//! # HTTP Surface
//!
//! ```text
//!   POST /webhook/chat   signed chat update  ──► ApprovalWorkflow ──► outbox
//!   GET  /health         database reachable, pending outbox size
//! ```
//!
//! The webhook answers 200 as soon as the replies are queued; the
//! dispatcher sends them on its next tick. Answers to roster changes are
//! queued with the change itself, so a 500 never follows an applied
//! approval.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use tally_db::Database;
use tally_notify::{
    verify_signature, ApprovalWorkflow, ChatUpdate, NotifyConfig, SIGNATURE_HEADER,
};

use crate::error::ApiError;

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub db: Database,
    pub workflow: ApprovalWorkflow,
    pub webhook_secret: String,
}

impl AppState {
    pub fn new(db: Database, notify: &NotifyConfig) -> Self {
        AppState {
            workflow: ApprovalWorkflow::new(db.clone()),
            db,
            webhook_secret: notify.chat.webhook_secret.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/chat", post(chat_webhook))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

async fn chat_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if let Err(e) = verify_signature(&state.webhook_secret, &body, signature) {
        warn!(len = body.len(), "Rejected webhook with bad signature");
        return Err(e.into());
    }

    let update = ChatUpdate::from_slice(&body)?;
    let replies = state.workflow.handle(&update).await?;
    state.workflow.queue_replies(&replies).await?;

    debug!(update_id = update.update_id, replies = replies.len(), "Webhook handled");
    Ok(StatusCode::OK)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.db.health_check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        );
    }

    match state.db.notifications().count_pending().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "pending_notifications": pending })),
        ),
        Err(e) => {
            warn!(error = %e, "Outbox count failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
