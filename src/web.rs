//! # Webhook Endpoint Module
//!
//! Translates inbound HTTP traffic into message-handler invocations: the
//! one-time GET verification handshake and the POST delivery route, plus a
//! health endpoint. Payloads that don't contain a message are acknowledged
//! with 200 and ignored.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bot::MessageHandler;
use crate::conversation::InboundMessage;

pub struct AppState {
    pub handler: MessageHandler,
    pub verify_token: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", get(verify_webhook))
        .route("/webhook", post(receive_webhook))
        .with_state(state)
}

async fn root() -> &'static str {
    "WhatsApp Gallery Bot is running!"
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

/// Subscription handshake: echo the challenge only for a matching
/// mode/token pair.
async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode");
    let token = params.get("hub.verify_token");
    let challenge = params.get("hub.challenge");

    match (mode, token) {
        (Some(mode), Some(token)) => {
            if mode == "subscribe" && *token == state.verify_token {
                info!("webhook verified successfully");
                (StatusCode::OK, challenge.cloned().unwrap_or_default()).into_response()
            } else {
                warn!("webhook verification failed: invalid token or mode");
                StatusCode::FORBIDDEN.into_response()
            }
        }
        _ => {
            warn!("webhook verification failed: missing parameters");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Delivery route. Always 200 unless the handler itself errors.
async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let Some((sender, message)) = extract_first_message(&payload) else {
        debug!("no valid message in webhook payload");
        return StatusCode::OK;
    };

    match state.handler.handle_message(&sender, message).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(user_id = %sender, error = %e, "error processing webhook");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Pull the first message out of the nested delivery payload
/// (`entry[0].changes[0].value.messages[0]`). Returns `None` for any shape
/// mismatch.
pub fn extract_first_message(payload: &Value) -> Option<(String, InboundMessage)> {
    let message = payload
        .pointer("/entry/0/changes/0/value/messages/0")?
        .as_object()?;

    let sender = message.get("from")?.as_str()?.to_string();
    let kind = message.get("type").and_then(Value::as_str).unwrap_or("");

    let inbound = match kind {
        "text" => {
            let body = message
                .get("text")
                .and_then(|t| t.get("body"))
                .and_then(Value::as_str)?
                .to_string();
            InboundMessage::Text(body)
        }
        "image" => {
            let media_id = message
                .get("image")
                .and_then(|i| i.get("id"))
                .and_then(Value::as_str)?
                .to_string();
            InboundMessage::Image { media_id }
        }
        _ => InboundMessage::Unsupported,
    };

    Some((sender, inbound))
}
