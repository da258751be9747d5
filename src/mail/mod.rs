//! Mail provider access.
//!
//! The `Mailbox` trait is the seam between the triage engine and the
//! provider: the engine reads metadata and drafts through it and performs
//! its only two mutations (archive, create draft) through it.

pub mod auth;
pub mod gmail;
pub mod types;

pub use gmail::GmailClient;
pub use types::{DraftRef, DraftRequest, MessageMeta, Sender};

use async_trait::async_trait;

use crate::error::MailError;

/// A mailbox the triage engine can read from and write drafts to.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Ids of inbox messages received within the last `window_days` days,
    /// at most `limit`, in provider order.
    async fn list_recent(&self, window_days: u32, limit: u32) -> Result<Vec<String>, MailError>;

    /// Headers and snippet for one message.
    async fn get_metadata(&self, id: &str) -> Result<MessageMeta, MailError>;

    /// Remove a message from the inbox.
    async fn archive(&self, id: &str) -> Result<(), MailError>;

    /// Every draft currently stored, with the thread it belongs to.
    async fn list_drafts(&self) -> Result<Vec<DraftRef>, MailError>;

    /// Persist a reply draft and return its id.
    async fn create_draft(&self, draft: &DraftRequest) -> Result<String, MailError>;
}
