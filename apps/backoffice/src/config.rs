//! Backoffice configuration module.
//!
//! Loaded in layers: built-in defaults, then `backoffice.toml`, then
//! `TALLY_*` environment variables, then validation.
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/tally/tally.db"
//! max_connections = 5
//!
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [notify.chat]
//! bot_token = "123456:ABC..."
//! ops_chat_id = -1001234567890
//! webhook_secret = "change-me"
//! bootstrap_admin_ids = [11111111]
//! ```
//!
//! ## Environment Variables
//! - `TALLY_DB_PATH`, `TALLY_DB_MAX_CONNECTIONS`
//! - `TALLY_BIND_ADDR`, `TALLY_PORT`
//! - `TALLY_CHAT_API_URL`, `TALLY_BOT_TOKEN`, `TALLY_OPS_CHAT_ID`
//! - `TALLY_WEBHOOK_SECRET`
//! - `TALLY_BOOTSTRAP_ADMIN_IDS` (comma separated)

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::{debug, info};

use tally_db::DbConfig;
use tally_notify::NotifyConfig;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid notify configuration: {0}")]
    Notify(#[from] tally_notify::NotifyError),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "tally", "pos")
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.path).max_connections(self.max_connections)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind_addr".into()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// =============================================================================
// Backoffice Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackofficeConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub notify: NotifyConfig,
}

impl BackofficeConfig {
    /// Loads configuration from file (if present) and the environment.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading backoffice config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("database.path".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".into()));
        }
        self.server.socket_addr()?;
        self.notify.validate()?;
        Ok(())
    }

    /// Applies `TALLY_*` overrides read through `var`.
    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = var("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = var("TALLY_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("TALLY_DB_MAX_CONNECTIONS", &max)?;
        }

        if let Some(addr) = var("TALLY_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = var("TALLY_PORT") {
            self.server.port = parse_var("TALLY_PORT", &port)?;
        }

        let chat = &mut self.notify.chat;
        if let Some(url) = var("TALLY_CHAT_API_URL") {
            chat.api_base_url = url;
        }
        if let Some(token) = var("TALLY_BOT_TOKEN") {
            debug!("Overriding bot token from environment");
            chat.bot_token = token;
        }
        if let Some(id) = var("TALLY_OPS_CHAT_ID") {
            chat.ops_chat_id = Some(parse_var("TALLY_OPS_CHAT_ID", &id)?);
        }
        if let Some(secret) = var("TALLY_WEBHOOK_SECRET") {
            chat.webhook_secret = secret;
        }
        if let Some(ids) = var("TALLY_BOOTSTRAP_ADMIN_IDS") {
            chat.bootstrap_admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_var("TALLY_BOOTSTRAP_ADMIN_IDS", s))
                .collect::<Result<_, _>>()?;
        }

        Ok(())
    }

    /// Gets the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("backoffice.toml"))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}
