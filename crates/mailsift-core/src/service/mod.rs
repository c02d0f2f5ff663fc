//! Mailbox service layer.
//!
//! Bridges the ingestion core with the provider client crate. The core only
//! sees the [`MailboxProvider`] trait; [`GmailMailbox`] implements it over
//! `mailsift-gmail`.

pub mod gmail;
pub mod mailbox;

pub use gmail::GmailMailbox;
pub use mailbox::{
    FullMessage, HistoryDelta, HistoryId, MailboxProvider, MessageAdded, OutgoingMessage,
    ProviderError, SentMessage, WatchAck,
};
