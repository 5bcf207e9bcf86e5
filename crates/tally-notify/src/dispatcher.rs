//! # Outbox Dispatcher
//!
//! Delivers queued notifications to the chat platform.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every poll_interval_secs                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  get_pending_for(batch_size, max_attempts, ops chat configured?)        │
//! │       oldest first, below limit; ops entries only with an ops chat      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  for each entry:                                                        │
//! │    decode payload ── render text ── chat_id or ops chat                 │
//! │       │                                                                 │
//! │       ├── sent   ──► mark_sent                                          │
//! │       └── failed ──► mark_failed (attempts += 1, last_error)            │
//! │                                                                         │
//! │  every hour: cleanup_sent(cleanup_after_days)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once: a crash between a successful send and
//! `mark_sent` sends that message again on the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tally_db::Database;

use crate::client::MessageSender;
use crate::config::{DispatchSettings, NotifyConfig};
use crate::error::{NotifyError, NotifyResult};
use crate::message;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    db: Database,
    sender: Arc<dyn MessageSender>,
    settings: DispatchSettings,
    ops_chat_id: Option<i64>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    pub async fn shutdown(&self) -> NotifyResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| NotifyError::InvalidConfig("dispatcher already stopped".into()))
    }
}

impl Dispatcher {
    pub fn new(
        db: Database,
        sender: Arc<dyn MessageSender>,
        config: &NotifyConfig,
    ) -> (Self, DispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        if config.chat.ops_chat_id.is_none() {
            warn!("No ops chat configured, ops notifications stay queued");
        }

        let dispatcher = Dispatcher {
            db,
            sender,
            settings: config.dispatch.clone(),
            ops_chat_id: config.chat.ops_chat_id,
            shutdown_rx,
        };

        (dispatcher, DispatcherHandle { shutdown_tx })
    }

    /// Runs until [`DispatcherHandle::shutdown`] is called.
    ///
    /// Spawn this as a background task.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.settings.poll_interval_secs,
            batch_size = self.settings.batch_size,
            "Notification dispatcher starting"
        );

        let mut poll = tokio::time::interval(self.settings.poll_interval());
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut cleanup = tokio::time::interval(CLEANUP_INTERVAL);
        cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(?e, "Failed to dispatch notifications");
                    }
                }

                _ = cleanup.tick() => {
                    self.cleanup().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Notification dispatcher stopped");
    }

    /// Sends one batch of pending entries.
    pub async fn run_once(&self) -> NotifyResult<DispatchReport> {
        let outbox = self.db.notifications();
        let entries = outbox
            .get_pending_for(
                self.settings.batch_size,
                self.settings.max_attempts,
                self.ops_chat_id.is_some(),
            )
            .await?;

        let mut report = DispatchReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        debug!(count = entries.len(), "Dispatching notifications");

        for entry in entries {
            let payload = match entry.payload() {
                Ok(p) => p,
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Undecodable notification payload");
                    outbox
                        .mark_failed(&entry.id, &format!("invalid payload: {e}"))
                        .await?;
                    report.failed += 1;
                    continue;
                }
            };

            let Some(chat_id) = entry.chat_id.or(self.ops_chat_id) else {
                continue;
            };

            let text = message::render(&payload);
            match self.sender.send_message(chat_id, &text).await {
                Ok(()) => {
                    outbox.mark_sent(&entry.id).await?;
                    report.sent += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(id = %entry.id, chat_id, attempts = entry.attempts + 1, error = %e, "Notification delivery failed, will retry");
                    } else {
                        error!(id = %entry.id, chat_id, error = %e, "Notification rejected by chat API");
                    }
                    outbox.mark_failed(&entry.id, &e.to_string()).await?;
                    report.failed += 1;
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            info!(
                sent = report.sent,
                failed = report.failed,
                "Dispatch pass finished"
            );
        }
        Ok(report)
    }

    async fn cleanup(&self) {
        let days = self.settings.cleanup_after_days;
        if days == 0 {
            return;
        }
        match self.db.notifications().cleanup_sent(days).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, days, "Purged delivered notifications"),
            Err(e) => error!(?e, "Failed to purge delivered notifications"),
        }
    }
}
