//! # Notify Configuration
//!
//! The `[notify]` section of `backoffice.toml`.
//!
//! ## Configuration File Format
//! ```toml
//! [notify.chat]
//! api_base_url = "https://api.telegram.org"
//! bot_token = "123456:ABC..."
//! ops_chat_id = -1001234567890
//! webhook_secret = "change-me"
//! bootstrap_admin_ids = [11111111]
//!
//! [notify.dispatch]
//! batch_size = 20
//! poll_interval_secs = 5
//! max_attempts = 5
//! request_timeout_secs = 10
//! cleanup_after_days = 30
//! ```
//!
//! An empty `bot_token` disables outbound delivery; messages still
//! accumulate in the outbox and go out once a token is configured.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NotifyError, NotifyResult};

// =============================================================================
// Chat Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Base URL of the bot API, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub bot_token: String,

    /// Group chat that receives shift, stock and admin-request messages.
    #[serde(default)]
    pub ops_chat_id: Option<i64>,

    /// Shared secret for the `X-Tally-Signature` webhook header.
    #[serde(default)]
    pub webhook_secret: String,

    /// Chat users approved at every startup.
    #[serde(default)]
    pub bootstrap_admin_ids: Vec<i64>,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            api_base_url: default_api_base_url(),
            bot_token: String::new(),
            ops_chat_id: None,
            webhook_secret: String::new(),
            bootstrap_admin_ids: Vec::new(),
        }
    }
}

// =============================================================================
// Dispatch Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Outbox entries sent per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Entries with this many failed attempts are left alone.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delivered entries older than this are purged; 0 keeps them forever.
    #[serde(default = "default_cleanup_after_days")]
    pub cleanup_after_days: u32,
}

fn default_batch_size() -> u32 {
    20
}
fn default_poll_interval() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    5
}
fn default_request_timeout() -> u64 {
    10
}
fn default_cleanup_after_days() -> u32 {
    30
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout(),
            cleanup_after_days: default_cleanup_after_days(),
        }
    }
}

impl DispatchSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Notify Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub chat: ChatSettings,

    #[serde(default)]
    pub dispatch: DispatchSettings,
}

impl NotifyConfig {
    /// True when a bot token is configured.
    pub fn is_enabled(&self) -> bool {
        !self.chat.bot_token.trim().is_empty()
    }

    pub fn validate(&self) -> NotifyResult<()> {
        let url = &self.chat.api_base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(NotifyError::InvalidConfig(format!(
                "api_base_url must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.dispatch.batch_size == 0 {
            return Err(NotifyError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.dispatch.poll_interval_secs == 0 {
            return Err(NotifyError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(NotifyError::InvalidConfig(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.dispatch.request_timeout_secs == 0 {
            return Err(NotifyError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.is_enabled() {
            if self.chat.ops_chat_id.is_none() {
                return Err(NotifyError::InvalidConfig(
                    "ops_chat_id is required when a bot token is set".into(),
                ));
            }
            if self.chat.webhook_secret.trim().is_empty() {
                return Err(NotifyError::InvalidConfig(
                    "webhook_secret is required when a bot token is set".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> NotifyConfig {
        NotifyConfig {
            chat: ChatSettings {
                bot_token: "123:abc".into(),
                ops_chat_id: Some(-100),
                webhook_secret: "s3cret".into(),
                ..ChatSettings::default()
            },
            dispatch: DispatchSettings::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = NotifyConfig::default();
        assert!(!config.is_enabled());
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch.batch_size, 20);
        assert_eq!(config.dispatch.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_enabled_requires_ops_chat_and_secret() {
        assert!(enabled().validate().is_ok());

        let mut config = enabled();
        config.chat.ops_chat_id = None;
        assert!(config.validate().is_err());

        let mut config = enabled();
        config.chat.webhook_secret = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = enabled();
        config.chat.api_base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());

        let mut config = enabled();
        config.dispatch.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = enabled();
        config.dispatch.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_defaults_fill_missing_fields() {
        let config: NotifyConfig =
            serde_json::from_str(r#"{"chat": {"bot_token": "t", "ops_chat_id": 5}}"#).unwrap();
        assert_eq!(config.chat.api_base_url, "https://api.telegram.org");
        assert_eq!(config.chat.ops_chat_id, Some(5));
        assert_eq!(config.dispatch, DispatchSettings::default());
    }
}
