//! # Notify Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Configuration     Transport          Chat API           Inbound        │
//! │  ─────────────     ─────────          ────────           ───────        │
//! │  InvalidConfig     Http               Api                InvalidSignature│
//! │                    Timeout                               InvalidUpdate  │
//! │                                                                         │
//! │  Storage: Database (outbox, admin roster)   Payload: Serialization      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid notify configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request never got an HTTP answer (DNS, connect, TLS, body).
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Chat API request timed out")]
    Timeout,

    /// The chat API answered but refused the message.
    #[error("Chat API rejected the request (status {status}): {description}")]
    Api { status: u16, description: String },

    // =========================================================================
    // Inbound Errors
    // =========================================================================
    #[error("Webhook signature is missing or invalid")]
    InvalidSignature,

    #[error("Malformed chat update: {0}")]
    InvalidUpdate(String),

    // =========================================================================
    // Storage and Payload Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] tally_db::DbError),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl NotifyError {
    /// Whether a later attempt might succeed.
    ///
    /// Rate limiting and server-side failures are retryable; other 4xx
    /// answers (bad chat id, bot blocked) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Http(_) | NotifyError::Timeout => true,
            NotifyError::Api { status, .. } => *status == 429 || *status >= 500,
            NotifyError::Database(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(NotifyError::Timeout.is_retryable());
        assert!(NotifyError::Http("connection refused".into()).is_retryable());
        assert!(NotifyError::Api {
            status: 429,
            description: "Too Many Requests".into()
        }
        .is_retryable());
        assert!(NotifyError::Api {
            status: 502,
            description: "Bad Gateway".into()
        }
        .is_retryable());

        assert!(!NotifyError::Api {
            status: 403,
            description: "bot was blocked by the user".into()
        }
        .is_retryable());
        assert!(!NotifyError::InvalidSignature.is_retryable());

        assert!(NotifyError::Database(tally_db::DbError::Busy).is_retryable());
        assert!(!NotifyError::Database(tally_db::DbError::not_found("Order", "x")).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = NotifyError::Api {
            status: 400,
            description: "chat not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Chat API rejected the request (status 400): chat not found"
        );
    }
}
