//! # tally-notify: Chat Integration for Tally POS
//!
//! Outbound operational messages and the inbound admin-approval bot.
//!
//! ## Message Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  tally-db transaction ──► notifications (outbox)                        │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                          Dispatcher ──► message::render ──► ChatClient  │
//! │                                                                 │       │
//! │                                                                 ▼       │
//! │                                                           Chat platform │
//! │                                                                 │       │
//! │  POST /webhook/chat ◄───────────────────────────────────────────┘       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  webhook::verify_signature ──► ChatUpdate ──► ApprovalWorkflow          │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                                     replies queued in the outbox        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `[notify]` configuration section
//! - [`client`] - `MessageSender` trait and the reqwest `ChatClient`
//! - [`message`] - Message texts
//! - [`dispatcher`] - Outbox polling task
//! - [`webhook`] - Signature check, update and command parsing
//! - [`approval`] - Admin approval workflow
//! - [`error`] - Error types

pub mod approval;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod webhook;

pub use approval::{ApprovalWorkflow, Reply};
pub use client::{ChatClient, MessageSender};
pub use config::{ChatSettings, DispatchSettings, NotifyConfig};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherHandle};
pub use error::{NotifyError, NotifyResult};
pub use webhook::{verify_signature, ChatUpdate, Command, SIGNATURE_HEADER};
