//! # mailsift-core
//!
//! Notification-driven email ingestion for `mailsift`.
//!
//! This crate provides:
//! - **Text normalization** - display and classifier forms of a message body
//! - **Classification** - batch adapter over local or hosted engines
//! - **Record store** - `SQLite` persistence, one record per message
//! - **Dedup guard** - in-batch, in-flight and persisted duplicate checks
//! - **Ingestion engine** - history cursor and per-message pipeline
//! - **Broadcast** - live fan-out of processed messages
//! - **Auto-reply** - reply policy, bounded-retry generation and sending
//! - **Mailbox service** - provider trait and the Gmail implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod broadcast;
pub mod classify;
mod config;
pub mod dedup;
mod error;
pub mod ingest;
pub mod record;
pub mod reply;
pub mod service;
pub mod text;

pub use broadcast::{Broadcaster, MailboxKind, MessageEvent, Subscription};
pub use classify::{
    Category, ClassificationAdapter, ClassificationEngine, ClassificationResult, Priority,
    Sentiment,
};
pub use config::{Config, DEFAULT_BIND};
pub use dedup::{BatchDedupSet, DedupDecision, DedupGuard, SkipReason};
pub use error::{Error, Result};
pub use ingest::{
    CursorState, CursorStore, IngestReport, IngestionEngine, Notification, NotificationReport,
    SentSummary,
};
pub use record::{NewRecord, ProcessedMessage, RecordRepository, RecordStore};
pub use reply::{ReplyDraft, ReplyGenerator, ReplyOrchestrator};
pub use service::{GmailMailbox, HistoryId, MailboxProvider};
