//! Webhook HTTP layer: receives gateway deliveries and hands them to the
//! router.
//!
//! The endpoint always answers 200, even for payloads it drops or internal
//! failures — a non-200 would make the gateway retry the same payload in a
//! loop. Dispatch runs in a spawned task so a slow collaborator never holds
//! the webhook response open.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router as HttpRouter};
use serde_json::{Value, json};
use tracing::{debug, info};

use router_core::Router;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    /// Our own number (digits); webhook echoes of our own sends are dropped.
    pub own_number: Option<String>,
    pub instance_label: String,
}

pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let app = HttpRouter::new()
        .route("/", get(health))
        .route("/webhook", post(receive))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    info!(addr = %addr, "Webhook server listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding webhook listener on {addr}"))?;
    axum::serve(listener, app).await.context("webhook server")
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "instance": state.instance_label,
        "endpoint": "/webhook",
    }))
}

async fn receive(State(state): State<AppState>, Json(body): Json<Value>) -> StatusCode {
    let webhook_type = body.get("typeWebhook").and_then(Value::as_str);
    let Some(message) = extract_message(&body) else {
        debug!(webhook_type = ?webhook_type, "Ignoring webhook without routable message");
        return StatusCode::OK;
    };

    if let Some(own) = &state.own_number {
        if digits(&message.sender_id) == *own {
            debug!("Ignoring own message echo");
            return StatusCode::OK;
        }
    }

    let router = Arc::clone(&state.router);
    tokio::spawn(async move {
        router
            .handle_incoming_message(
                &message.chat_id,
                &message.sender_id,
                &message.text,
                &message.sender_name,
            )
            .await;
    });
    StatusCode::OK
}

#[derive(Debug, PartialEq, Eq)]
struct IncomingMessage {
    chat_id: String,
    sender_id: String,
    sender_name: String,
    text: String,
}

fn digits(id: &str) -> String {
    id.chars().filter(char::is_ascii_digit).collect()
}

/// Pulls chat, sender, and text out of a gateway webhook payload. `None` for
/// anything that is not an incoming text message.
fn extract_message(body: &Value) -> Option<IncomingMessage> {
    if body.get("typeWebhook").and_then(Value::as_str) != Some("incomingMessageReceived") {
        return None;
    }

    let sender_data = body.get("senderData")?;
    let chat_id = sender_data.get("chatId").and_then(Value::as_str)?;
    let sender_id = sender_data
        .get("sender")
        .and_then(Value::as_str)
        .unwrap_or(chat_id);
    let sender_name = sender_data
        .get("senderName")
        .and_then(Value::as_str)
        .unwrap_or("");

    let message_data = body.get("messageData")?;
    let text = match message_data.get("typeMessage").and_then(Value::as_str) {
        Some("textMessage") => message_data
            .get("textMessageData")?
            .get("textMessage")
            .and_then(Value::as_str),
        Some("extendedTextMessage") => message_data
            .get("extendedTextMessageData")?
            .get("text")
            .and_then(Value::as_str),
        Some(_) | None => None,
    }?;
    if text.is_empty() {
        return None;
    }

    Some(IncomingMessage {
        chat_id: chat_id.to_owned(),
        sender_id: sender_id.to_owned(),
        sender_name: sender_name.to_owned(),
        text: text.to_owned(),
    })
}
