//! Ingestion of new mailbox messages.

mod cursor;
mod engine;
mod notification;
mod sent;

pub use cursor::{CursorState, CursorStore, DeltaCommit, IngestionCursor};
pub use engine::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_RECONCILE_LIMIT, EngineState, FailedMessage, INBOX_QUERY,
    IngestReport, IngestionEngine, NotificationReport, SkippedMessage,
};
pub use notification::Notification;
pub use sent::{SENT_LABEL, SENT_QUERY, SentSummary};
