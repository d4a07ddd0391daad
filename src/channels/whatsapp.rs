//! Twilio WhatsApp webhook and the HTTP routes served next to it.
//!
//! Twilio posts each inbound message as a form (`Body`, `From`) and expects
//! TwiML back; every outbound chunk becomes one `<Message>` element.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ChannelError;
use crate::interview::controller::UNREADABLE_MESSAGE;
use crate::interview::{InboundTurn, InterviewController};

use super::split::split_message;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub controller: Arc<InterviewController>,
    /// Maximum characters per outbound message payload.
    pub chunk_size: usize,
}

/// Fields Twilio sends for an inbound WhatsApp message.
#[derive(Debug, Deserialize)]
pub struct TwilioMessage {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

impl TwilioMessage {
    fn validate(&self) -> Result<(), ChannelError> {
        if self.from.trim().is_empty() {
            return Err(ChannelError::InvalidMessage("missing From".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(ChannelError::InvalidMessage("empty Body".to_string()));
        }
        Ok(())
    }
}

/// POST /whatsapp
async fn receive(
    State(state): State<WebhookState>,
    Form(msg): Form<TwilioMessage>,
) -> impl IntoResponse {
    let text = match msg.validate() {
        Ok(()) => {
            let turn = InboundTurn::new(msg.from.trim(), msg.body);
            state.controller.handle(turn).await.text
        }
        Err(e) => {
            warn!(from = %msg.from, error = %e, "Rejected inbound WhatsApp message");
            UNREADABLE_MESSAGE.to_string()
        }
    };

    let chunks = split_message(&text, state.chunk_size);
    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml(&chunks),
    )
}

/// GET /api/conversations/{id}
async fn conversation_status(
    State(state): State<WebhookState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.controller.status(&id).await {
        Ok(Some(status)) => Json(status).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Unknown conversation"})),
        )
            .into_response(),
        Err(e) => {
            error!(conversation_id = %id, error = %e, "Status lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Session store unavailable"})),
            )
                .into_response()
        }
    }
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// Build the webhook, status and health routes.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/whatsapp", post(receive))
        .route("/api/conversations/{id}", get(conversation_status))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// TwiML response with one `<Message>` per chunk.
pub fn twiml(chunks: &[String]) -> String {
    let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
    for chunk in chunks {
        out.push_str("<Message>");
        out.push_str(&escape_xml(chunk));
        out.push_str("</Message>");
    }
    out.push_str("</Response>");
    out
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
