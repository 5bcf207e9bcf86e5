//! # Inbound Webhook
//!
//! The chat platform posts every message the bot receives to
//! `POST /webhook/chat`. A relay in front of the platform signs the raw
//! body with the shared secret:
//!
//! ```text
//! X-Tally-Signature: hex(HMAC-SHA256(webhook_secret, raw body))
//! ```
//!
//! Only updates with a verified signature are parsed.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tally_core::validation::validate_chat_user_id;

use crate::error::{NotifyError, NotifyResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Tally-Signature";

// =============================================================================
// Signature
// =============================================================================

/// Checks `header_hex` against the body's HMAC in constant time.
///
/// An empty secret never verifies.
pub fn verify_signature(secret: &str, body: &[u8], header_hex: &str) -> NotifyResult<()> {
    if secret.is_empty() {
        return Err(NotifyError::InvalidSignature);
    }

    let expected = hex::decode(header_hex.trim()).map_err(|_| NotifyError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| NotifyError::InvalidSignature)?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| NotifyError::InvalidSignature)
}

/// Hex HMAC-SHA256 of `body`, the value a sender puts in the header.
pub fn sign(secret: &str, body: &[u8]) -> NotifyResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// =============================================================================
// Updates
// =============================================================================

/// One inbound event. Only text messages are acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<ChatUser>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl ChatUpdate {
    pub fn from_slice(body: &[u8]) -> NotifyResult<Self> {
        serde_json::from_slice(body).map_err(|e| NotifyError::InvalidUpdate(e.to_string()))
    }

    /// Sender, chat and text of a text message; `None` for anything else.
    pub fn text_message(&self) -> Option<(&ChatUser, i64, &str)> {
        let message = self.message.as_ref()?;
        let from = message.from.as_ref()?;
        let text = message.text.as_deref()?;
        Some((from, message.chat.id, text))
    }
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Approve(i64),
    Reject(i64),
    Status,
    Help,
    /// A known command with a bad or missing argument.
    Malformed { command: String, reason: String },
    Unknown(String),
}

impl Command {
    /// Parses a message text. Returns `None` when it is not a command.
    ///
    /// Accepts the `/cmd@BotName` form used in group chats.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let mut parts = rest.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let arg = parts.next();

        let command = match name.as_str() {
            "start" => Command::Start,
            "status" => Command::Status,
            "help" => Command::Help,
            "approve" | "reject" => {
                let parsed = arg
                    .ok_or_else(|| format!("usage: /{name} <user id>"))
                    .and_then(|raw| validate_chat_user_id(raw).map_err(|e| e.to_string()));
                match parsed {
                    Ok(id) if name == "approve" => Command::Approve(id),
                    Ok(id) => Command::Reject(id),
                    Err(reason) => Command::Malformed {
                        command: name.clone(),
                        reason,
                    },
                }
            }
            _ => Command::Unknown(name.clone()),
        };

        Some(command)
    }
}
