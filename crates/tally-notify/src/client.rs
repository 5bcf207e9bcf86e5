//! # Chat Client
//!
//! Outbound side of the chat platform: one `sendMessage` call per message.
//!
//! ```text
//! POST {api_base_url}/bot{token}/sendMessage
//! {"chat_id": -1001234, "text": "Shift closed ..."}
//!
//! 200 {"ok": true,  "result": {...}}           delivered
//! 400 {"ok": false, "description": "..."}      NotifyError::Api
//! 200 {"ok": false, "description": "..."}      NotifyError::Api
//! ```
//!
//! The bot token is part of the URL, so request URLs are never logged.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ChatSettings;
use crate::error::{NotifyError, NotifyResult};

/// Anything that can deliver a text message to a chat.
///
/// The dispatcher only sees this trait, so tests swap in a recorder.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> NotifyResult<()>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// reqwest-backed [`MessageSender`] for the bot API.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    send_url: String,
}

impl ChatClient {
    pub fn new(settings: &ChatSettings, timeout: Duration) -> NotifyResult<Self> {
        if settings.bot_token.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("bot_token is empty".into()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;

        let send_url = format!(
            "{}/bot{}/sendMessage",
            settings.api_base_url.trim_end_matches('/'),
            settings.bot_token.trim()
        );

        Ok(ChatClient { http, send_url })
    }
}

#[async_trait]
impl MessageSender for ChatClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> NotifyResult<()> {
        let response = self
            .http
            .post(&self.send_url)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

        if status.is_success() && parsed.as_ref().is_some_and(|r| r.ok) {
            debug!(chat_id, "Chat message delivered");
            return Ok(());
        }

        let description = parsed
            .and_then(|r| r.description)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        })
    }
}
