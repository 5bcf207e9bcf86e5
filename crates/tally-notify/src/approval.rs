//! # Admin Approval Workflow
//!
//! Turns a verified chat update into roster changes and replies.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!  sender status  │ /start        /approve /reject   /status  other  │
//!  ───────────────┼──────────────────────────────────────────────────┤
//!  unknown        │ request       denied             denied   denied │
//!  pending        │ "pending"     denied             denied   denied │
//!  rejected       │ "rejected"    denied             denied   denied │
//!  approved       │ "already"     decide             summary  help   │
//!                 └──────────────────────────────────────────────────┘
//! ```
//!
//! Roster changes queue their own outbox messages (the admin request for
//! the ops chat, the decision for the requester). The answer to a command
//! that changed the roster is queued in that same transaction and comes
//! back marked `queued`; the caller queues the rest with
//! [`ApprovalWorkflow::queue_replies`]. A failure there leaves no state
//! behind, so a redelivered update gets the same answer.

use tracing::{debug, info};

use tally_core::{AdminStatus, NotificationPayload};
use tally_db::{Database, DbError};

use crate::error::NotifyResult;
use crate::message::{self, ACCESS_DENIED, HELP};
use crate::webhook::{ChatUpdate, Command};

/// A message for one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
    /// Already in the outbox, committed with a roster change.
    pub queued: bool,
}

impl Reply {
    fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Reply {
            chat_id,
            text: text.into(),
            queued: false,
        }
    }

    fn queued(chat_id: i64, text: impl Into<String>) -> Self {
        Reply {
            queued: true,
            ..Reply::new(chat_id, text)
        }
    }
}

fn start_text(status: AdminStatus, created: bool) -> &'static str {
    match status {
        AdminStatus::Pending if created => {
            "Access requested. You will get a message once an admin decides."
        }
        AdminStatus::Pending => "Your request is still pending.",
        AdminStatus::Rejected => "Your admin access request was rejected.",
        AdminStatus::Approved => "You are already an approved admin.",
    }
}

fn decided_text(target: i64, status: AdminStatus) -> String {
    format!("User {target} is now {status}.")
}

#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    db: Database,
}

impl ApprovalWorkflow {
    pub fn new(db: Database) -> Self {
        ApprovalWorkflow { db }
    }

    /// Handles one update. Non-text updates produce no replies.
    pub async fn handle(&self, update: &ChatUpdate) -> NotifyResult<Vec<Reply>> {
        let Some((from, chat_id, text)) = update.text_message() else {
            debug!(update_id = update.update_id, "Ignoring non-text update");
            return Ok(Vec::new());
        };

        let command = Command::parse(text);
        let admins = self.db.chat_admins();
        let sender = admins.get_by_chat_user(from.id).await?;
        let status = sender.as_ref().map(|a| a.status);

        debug!(
            update_id = update.update_id,
            chat_user_id = from.id,
            ?command,
            ?status,
            "Chat update"
        );

        if status != Some(AdminStatus::Approved) {
            let reply = match (command, status) {
                (Some(Command::Start), None) => {
                    let (admin, created) = admins
                        .request_replying(from.id, from.username.as_deref(), |admin, created| {
                            Some((chat_id, start_text(admin.status, created).to_string()))
                        })
                        .await?;
                    Reply::queued(chat_id, start_text(admin.status, created))
                }
                (Some(Command::Start), Some(status)) => {
                    Reply::new(chat_id, start_text(status, false))
                }
                _ => Reply::new(chat_id, ACCESS_DENIED),
            };
            return Ok(vec![reply]);
        }

        let text = match command {
            Some(Command::Start) => start_text(AdminStatus::Approved, false).to_string(),
            Some(Command::Approve(target)) => {
                return Ok(vec![self.decide(from.id, chat_id, target, true).await?]);
            }
            Some(Command::Reject(target)) => {
                return Ok(vec![self.decide(from.id, chat_id, target, false).await?]);
            }
            Some(Command::Status) => {
                let shift = self.db.shifts().current_open().await?;
                message::shift_status(shift.as_ref())
            }
            Some(Command::Malformed { reason, .. }) => reason,
            Some(Command::Unknown(name)) => {
                format!("Unknown command /{name}. Send /help for the list.")
            }
            Some(Command::Help) | None => HELP.to_string(),
        };

        Ok(vec![Reply::new(chat_id, text)])
    }

    /// Queues replies for delivery by the dispatcher, skipping those
    /// already queued with their roster change.
    pub async fn queue_replies(&self, replies: &[Reply]) -> NotifyResult<()> {
        let outbox = self.db.notifications();
        for reply in replies.iter().filter(|r| !r.queued) {
            let payload = NotificationPayload::Reply {
                text: reply.text.clone(),
            };
            outbox.queue(Some(reply.chat_id), &payload).await?;
        }
        Ok(())
    }

    async fn decide(
        &self,
        admin_id: i64,
        chat_id: i64,
        target: i64,
        approve: bool,
    ) -> NotifyResult<Reply> {
        if target == admin_id && !approve {
            return Ok(Reply::new(chat_id, "You cannot reject yourself."));
        }

        let result = self
            .db
            .chat_admins()
            .decide_replying(target, admin_id, approve, |record| {
                Some((chat_id, decided_text(target, record.status)))
            })
            .await;

        match result {
            Ok(record) => {
                info!(admin_id, target, status = %record.status, "Admin decision via chat");
                Ok(Reply::queued(chat_id, decided_text(target, record.status)))
            }
            Err(DbError::NotFound { .. }) => Ok(Reply::new(
                chat_id,
                format!("No access request from user {target}."),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::{Chat, ChatMessage, ChatUser};
    use tally_core::NotificationKind;
    use tally_db::DbConfig;

    fn update(user_id: i64, chat_id: i64, text: &str) -> ChatUpdate {
        ChatUpdate {
            update_id: 1,
            message: Some(ChatMessage {
                message_id: 1,
                from: Some(ChatUser {
                    id: user_id,
                    username: Some(format!("user{user_id}")),
                }),
                chat: Chat { id: chat_id },
                text: Some(text.to_string()),
            }),
        }
    }

    async fn workflow() -> (Database, ApprovalWorkflow) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.chat_admins().bootstrap(1).await.unwrap();
        (db.clone(), ApprovalWorkflow::new(db))
    }

    async fn reply_text(flow: &ApprovalWorkflow, user_id: i64, text: &str) -> String {
        let replies = flow.handle(&update(user_id, user_id, text)).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].chat_id, user_id);
        replies[0].text.clone()
    }

    #[tokio::test]
    async fn test_start_files_request_and_notifies_ops() {
        let (db, flow) = workflow().await;

        let text = reply_text(&flow, 50, "/start").await;
        assert!(text.starts_with("Access requested"));
        assert_eq!(reply_text(&flow, 50, "/start").await, "Your request is still pending.");

        // The request and its answer were committed together; the
        // "still pending" answer is left to the caller.
        let pending = db.notifications().get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, NotificationKind::AdminRequest);
        assert_eq!(pending[0].chat_id, None);
        assert_eq!(pending[1].kind, NotificationKind::Reply);
        assert_eq!(pending[1].chat_id, Some(50));
    }

    #[tokio::test]
    async fn test_roster_change_replies_are_queued_once() {
        let (db, flow) = workflow().await;
        let outbox = db.notifications();

        let replies = flow.handle(&update(50, 50, "/start")).await.unwrap();
        assert!(replies[0].queued);
        assert_eq!(outbox.count_pending().await.unwrap(), 2);

        let replies = flow.handle(&update(1, 1, "/approve 50")).await.unwrap();
        assert!(replies[0].queued);
        // Decision for 50 plus the answer to admin 1.
        assert_eq!(outbox.count_pending().await.unwrap(), 4);

        // Queuing them again is a no-op.
        flow.queue_replies(&replies).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 4);

        let replies = flow.handle(&update(1, 1, "/approve 99")).await.unwrap();
        assert!(!replies[0].queued);
        assert_eq!(outbox.count_pending().await.unwrap(), 4);
        flow.queue_replies(&replies).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 5);

        let to_admin: Vec<_> = outbox
            .get_pending(10, 5)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.chat_id == Some(1))
            .map(|n| n.payload().unwrap())
            .collect();
        assert_eq!(
            to_admin,
            vec![
                NotificationPayload::Reply {
                    text: "User 50 is now approved.".to_string()
                },
                NotificationPayload::Reply {
                    text: "No access request from user 99.".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unapproved_users_are_denied() {
        let (db, flow) = workflow().await;

        assert_eq!(reply_text(&flow, 50, "/status").await, ACCESS_DENIED);
        assert_eq!(reply_text(&flow, 50, "/approve 50").await, ACCESS_DENIED);
        assert_eq!(reply_text(&flow, 50, "hello").await, ACCESS_DENIED);

        reply_text(&flow, 50, "/start").await;
        assert_eq!(reply_text(&flow, 50, "/approve 50").await, ACCESS_DENIED);
        assert!(!db.chat_admins().is_approved(50).await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_approves_and_rejects() {
        let (db, flow) = workflow().await;
        reply_text(&flow, 50, "/start").await;
        reply_text(&flow, 60, "/start").await;

        assert_eq!(reply_text(&flow, 1, "/approve 50").await, "User 50 is now approved.");
        assert_eq!(reply_text(&flow, 1, "/reject 60").await, "User 60 is now rejected.");
        assert_eq!(
            reply_text(&flow, 1, "/approve 99").await,
            "No access request from user 99."
        );

        // The new admin can use commands right away.
        assert_eq!(reply_text(&flow, 50, "/status").await, "No shift is open.");
        assert_eq!(
            reply_text(&flow, 60, "/start").await,
            "Your admin access request was rejected."
        );

        let decisions: Vec<_> = db
            .notifications()
            .get_pending(10, 5)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::AdminDecision)
            .collect();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].chat_id, Some(50));
        assert_eq!(
            decisions[0].payload().unwrap(),
            NotificationPayload::AdminDecision {
                chat_user_id: 50,
                approved: true,
            }
        );
    }

    #[tokio::test]
    async fn test_admin_commands() {
        let (db, flow) = workflow().await;

        assert_eq!(reply_text(&flow, 1, "/help").await, HELP);
        assert_eq!(reply_text(&flow, 1, "just chatting").await, HELP);
        assert_eq!(reply_text(&flow, 1, "/reject 1").await, "You cannot reject yourself.");
        assert_eq!(
            reply_text(&flow, 1, "/approve").await,
            "usage: /approve <user id>"
        );
        assert!(reply_text(&flow, 1, "/refund").await.starts_with("Unknown command /refund"));

        db.shifts().open("Dana", 10_000).await.unwrap();
        let status = reply_text(&flow, 1, "/status").await;
        assert!(status.starts_with("Shift open since"));
        assert!(status.contains("(Dana)"));
    }

    #[tokio::test]
    async fn test_non_text_update_is_ignored() {
        let (_db, flow) = workflow().await;
        let empty = ChatUpdate {
            update_id: 2,
            message: None,
        };
        assert!(flow.handle(&empty).await.unwrap().is_empty());
    }
}
