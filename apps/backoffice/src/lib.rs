//! # Tally Backoffice
//!
//! The back-office process: delivers queued chat notifications and
//! receives bot commands from the chat platform.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Backoffice Process                              │
//! │                                                                         │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌────────────────────┐ │
//! │  │  config            │  │  server            │  │  Dispatcher        │ │
//! │  │                    │  │                    │  │  (tally-notify)    │ │
//! │  │ • backoffice.toml  │  │ • /webhook/chat    │  │ • outbox polling   │ │
//! │  │ • TALLY_* env      │  │ • /health          │  │ • sendMessage      │ │
//! │  └────────────────────┘  └────────────────────┘  └────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod server;

// Re-exports
pub use config::{BackofficeConfig, ConfigError};
pub use error::ApiError;
pub use server::{router, AppState};
