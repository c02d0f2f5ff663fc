//! Notification-driven ingestion.
//!
//! One invocation of [`IngestionEngine::handle_notification`] walks
//! `Idle → ResolvingDelta → ProcessingMessage* → Idle`, or
//! `Idle → Failed` when the delta cannot be resolved. The cursor lock is
//! only held to read the start position and to commit; every network call
//! happens outside it.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::cursor::{CursorStore, DeltaCommit, IngestionCursor};
use super::notification::Notification;
use super::sent::{SENT_QUERY, SentSummary};
use crate::broadcast::{Broadcaster, MessageEvent};
use crate::classify::ClassificationAdapter;
use crate::dedup::{BatchDedupSet, DedupDecision, DedupGuard, SkipReason};
use crate::error::bounded;
use crate::record::{NewRecord, ProcessedMessage, RecordStore};
use crate::reply::ReplyOrchestrator;
use crate::service::{HistoryId, MailboxProvider, SentMessage, WatchAck};
use crate::text::normalize;
use crate::{Error, Result};

/// Search query used by [`IngestionEngine::pull`].
pub const INBOX_QUERY: &str = "in:inbox";

/// Default bound on each external call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of messages listed by a reconciliation pull.
pub const DEFAULT_RECONCILE_LIMIT: u32 = 25;

/// Phase of one notification-handling invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Waiting for work.
    Idle,
    /// Fetching the history delta.
    ResolvingDelta,
    /// Running messages of the delta through the pipeline.
    ProcessingMessage,
    /// The delta could not be resolved; the cursor is unchanged.
    Failed,
}

impl EngineState {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingDelta => "resolving_delta",
            Self::ProcessingMessage => "processing_message",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message that was not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMessage {
    /// Provider message id.
    pub message_id: String,
    /// Why it was skipped.
    pub reason: &'static str,
}

/// A message whose processing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMessage {
    /// Provider message id.
    pub message_id: String,
    /// Failure description.
    pub error: String,
}

/// What happened to the messages of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Newly stored records, in processing order.
    pub processed: Vec<ProcessedMessage>,
    /// Messages skipped by the dedup guard.
    pub skipped: Vec<SkippedMessage>,
    /// Messages that failed and will be seen again.
    pub failed: Vec<FailedMessage>,
    /// Automated replies sent.
    pub replies_sent: usize,
}

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationReport {
    /// Token carried by the notification.
    pub history_id: HistoryId,
    /// Position the delta was resolved from.
    pub started_at: HistoryId,
    /// Highest position the delta covered.
    pub high_water: HistoryId,
    /// `true` if the start position had expired and a pull ran instead.
    pub reconciled: bool,
    /// Per-message outcomes.
    pub ingest: IngestReport,
}

enum Outcome {
    Processed(ProcessedMessage),
    Skipped(SkipReason),
    Failed(Error),
}

/// Tracks and logs the state of one invocation.
struct Invocation {
    token: HistoryId,
    state: EngineState,
}

impl Invocation {
    const fn new(token: HistoryId) -> Self {
        Self {
            token,
            state: EngineState::Idle,
        }
    }

    fn enter(&mut self, next: EngineState) {
        if self.state != next {
            debug!(history_id = %self.token, from = %self.state, to = %next, "Ingestion state");
            self.state = next;
        }
    }
}

type ReplyTasks = JoinSet<Result<Option<SentMessage>>>;

/// Resolves notifications into stored, broadcast and answered messages.
pub struct IngestionEngine {
    provider: Arc<dyn MailboxProvider>,
    classifier: ClassificationAdapter,
    records: Arc<dyn RecordStore>,
    cursors: Arc<dyn CursorStore>,
    dedup: DedupGuard,
    broadcaster: Broadcaster,
    replies: Option<ReplyOrchestrator>,
    mailbox: String,
    cursor: Mutex<IngestionCursor>,
    timeout: Duration,
    reconcile_limit: u32,
}

impl IngestionEngine {
    /// Creates an engine for `mailbox`, loading its persisted cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be loaded.
    pub async fn new(
        provider: Arc<dyn MailboxProvider>,
        classifier: ClassificationAdapter,
        records: Arc<dyn RecordStore>,
        cursors: Arc<dyn CursorStore>,
        broadcaster: Broadcaster,
        mailbox: impl Into<String>,
    ) -> Result<Self> {
        let mailbox = mailbox.into();
        let state = cursors.load_cursor(&mailbox).await?.unwrap_or_default();
        debug!(%mailbox, ?state, "Loaded ingestion cursor");

        Ok(Self {
            provider,
            classifier,
            dedup: DedupGuard::new(Arc::clone(&records)),
            records,
            cursors,
            broadcaster,
            replies: None,
            mailbox,
            cursor: Mutex::new(IngestionCursor::new(state)),
            timeout: DEFAULT_CALL_TIMEOUT,
            reconcile_limit: DEFAULT_RECONCILE_LIMIT,
        })
    }

    /// Enables automated replies.
    #[must_use]
    pub fn with_replies(mut self, orchestrator: ReplyOrchestrator) -> Self {
        self.replies = Some(orchestrator);
        self
    }

    /// Sets the bound on each provider call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many messages a pull after cursor expiry lists.
    #[must_use]
    pub const fn with_reconcile_limit(mut self, limit: u32) -> Self {
        self.reconcile_limit = limit;
        self
    }

    /// Current cursor state.
    pub async fn cursor_state(&self) -> super::cursor::CursorState {
        self.cursor.lock().await.state().clone()
    }

    /// Sets the cursor if it is still unknown, e.g. from a watch ack.
    ///
    /// Returns `true` if the cursor changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be persisted.
    pub async fn prime(&self, position: HistoryId) -> Result<bool> {
        let mut cursor = self.cursor.lock().await;
        if !cursor.prime(position) {
            return Ok(false);
        }
        self.cursors
            .store_cursor(&self.mailbox, cursor.state())
            .await?;
        info!(mailbox = %self.mailbox, history_id = %position, "Primed ingestion cursor");
        Ok(true)
    }

    /// Registers the push watch and primes an unknown cursor from the ack.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails or times out, or if the
    /// primed cursor cannot be persisted.
    pub async fn register_watch(&self, topic: &str) -> Result<WatchAck> {
        let ack = bounded(
            self.timeout,
            "watch registration",
            self.provider.register_watch(topic),
        )
        .await?;
        info!(
            topic,
            history_id = %ack.history_id,
            expiration_ms = ?ack.expiration_ms,
            "Registered mailbox watch"
        );
        self.prime(ack.history_id).await?;
        Ok(ack)
    }

    /// Handles one change notification.
    ///
    /// Failures of individual messages are reported, not returned; they keep
    /// the cursor from moving past them so a later delta sees them again.
    ///
    /// # Errors
    ///
    /// Returns an error if the delta cannot be resolved. The cursor is left
    /// unchanged and the notification is safe to redeliver.
    pub async fn handle_notification(&self, notification: &Notification) -> Result<NotificationReport> {
        let token = notification.history_id;
        let mut invocation = Invocation::new(token);

        let started_at = self.cursor.lock().await.resolve_start(token);
        invocation.enter(EngineState::ResolvingDelta);

        let delta = match bounded(
            self.timeout,
            "history delta",
            self.provider.get_history_delta(started_at),
        )
        .await
        {
            Ok(delta) => delta,
            Err(Error::CursorExpired(start)) => {
                warn!(%start, history_id = %token, "History cursor expired, reconciling");
                // The cursor moves only once the lost window has been pulled.
                let ingest = self.pull(self.reconcile_limit).await.inspect_err(|e| {
                    invocation.enter(EngineState::Failed);
                    error!(error = %e, "Reconciliation after cursor expiry failed");
                })?;
                self.reset_cursor(token).await;
                invocation.enter(EngineState::Idle);
                return Ok(NotificationReport {
                    history_id: token,
                    started_at,
                    high_water: token,
                    reconciled: true,
                    ingest,
                });
            }
            Err(e) => {
                invocation.enter(EngineState::Failed);
                error!(history_id = %token, %started_at, error = %e, "Failed to resolve history delta");
                return Err(e);
            }
        };

        let high_water = delta
            .events
            .iter()
            .map(|event| event.history_id)
            .chain(delta.high_water)
            .fold(started_at, HistoryId::max);

        let mut report = IngestReport::default();
        let mut batch = BatchDedupSet::new();
        let mut replies = ReplyTasks::new();
        let mut pinned = BTreeSet::new();

        for event in &delta.events {
            invocation.enter(EngineState::ProcessingMessage);
            let outcome = self.ingest_one(&mut batch, &event.message_id, &mut replies).await;
            let keep = matches!(
                outcome,
                Outcome::Failed(_) | Outcome::Skipped(SkipReason::InFlight)
            );
            if keep {
                pinned.insert(event.history_id.previous());
            }
            record_outcome(&mut report, &event.message_id, outcome);
        }

        self.commit(DeltaCommit {
            started_at,
            high_water,
            pinned,
        })
        .await;

        report.replies_sent = join_replies(&mut replies).await;
        invocation.enter(EngineState::Idle);

        info!(
            history_id = %token,
            %started_at,
            %high_water,
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Handled notification"
        );

        Ok(NotificationReport {
            history_id: token,
            started_at,
            high_water,
            reconciled: false,
            ingest: report,
        })
    }

    /// Lists the newest inbox messages and ingests any not yet stored.
    ///
    /// Does not touch the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the message listing fails.
    pub async fn pull(&self, limit: u32) -> Result<IngestReport> {
        let ids = bounded(
            self.timeout,
            "message listing",
            self.provider.list_message_ids(INBOX_QUERY, limit),
        )
        .await
        .inspect_err(|e| error!(error = %e, "Failed to list inbox messages"))?;

        let mut report = IngestReport::default();
        let mut batch = BatchDedupSet::new();
        let mut replies = ReplyTasks::new();

        for message_id in &ids {
            let outcome = self.ingest_one(&mut batch, message_id, &mut replies).await;
            record_outcome(&mut report, message_id, outcome);
        }
        report.replies_sent = join_replies(&mut replies).await;

        info!(
            listed = ids.len(),
            processed = report.processed.len(),
            failed = report.failed.len(),
            "Pulled inbox"
        );
        Ok(report)
    }

    /// Lists the newest sent messages without classifying or storing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing or any fetch fails.
    pub async fn list_sent(&self, limit: u32) -> Result<Vec<SentSummary>> {
        let ids = bounded(
            self.timeout,
            "message listing",
            self.provider.list_message_ids(SENT_QUERY, limit),
        )
        .await?;

        let mut sent = Vec::with_capacity(ids.len());
        for message_id in &ids {
            let message = bounded(
                self.timeout,
                "message fetch",
                self.provider.get_full_message(message_id),
            )
            .await
            .inspect_err(|e| warn!(%message_id, error = %e, "Failed to fetch sent message"))?;
            sent.push(SentSummary::from(&message));
        }

        debug!(listed = sent.len(), "Listed sent messages");
        Ok(sent)
    }

    async fn ingest_one(
        &self,
        batch: &mut BatchDedupSet,
        message_id: &str,
        replies: &mut ReplyTasks,
    ) -> Outcome {
        let claim = match self.dedup.check(batch, message_id).await {
            Ok(DedupDecision::Proceed(claim)) => claim,
            Ok(DedupDecision::Skip(reason)) => return Outcome::Skipped(reason),
            Err(e) => return Outcome::Failed(e),
        };

        let outcome = match self.process(claim.message_id(), replies).await {
            Ok(record) => Outcome::Processed(record),
            Err(Error::DuplicateRecord(_)) => Outcome::Skipped(SkipReason::AlreadyProcessed),
            Err(e) => Outcome::Failed(e),
        };
        drop(claim);
        outcome
    }

    async fn process(&self, message_id: &str, replies: &mut ReplyTasks) -> Result<ProcessedMessage> {
        let message = bounded(
            self.timeout,
            "message fetch",
            self.provider.get_full_message(message_id),
        )
        .await?;

        let text = normalize(&message.subject, &message.body);
        let classification = self.classifier.classify_one(&text.model_text).await?;

        let record = self
            .records
            .save(NewRecord {
                message_id: message_id.to_string(),
                subject: message.subject.clone(),
                raw_body: message.body.clone(),
                normalized_text: text.display_text,
                model_text: text.model_text,
                classification,
                received_at: message.received_at.unwrap_or_else(Utc::now),
            })
            .await?;

        info!(
            message_id = %record.message_id,
            label = %record.predicted_label,
            confidence = record.confidence,
            "Processed message"
        );

        self.broadcaster
            .publish(MessageEvent::new(&record, message.from(), message.to()));

        if let Some(orchestrator) = self.replies.as_ref().filter(|o| o.auto_send_enabled()) {
            let orchestrator = orchestrator.clone();
            let stored = record.clone();
            replies.spawn(async move { orchestrator.auto_reply(&stored, &message).await });
        }

        Ok(record)
    }

    async fn commit(&self, commit: DeltaCommit) {
        let mut cursor = self.cursor.lock().await;
        cursor.commit(commit);
        let state = cursor.state();
        debug!(?state, "Committed ingestion cursor");
        if let Err(e) = self.cursors.store_cursor(&self.mailbox, state).await {
            error!(error = %e, "Failed to persist ingestion cursor");
        }
    }

    async fn reset_cursor(&self, position: HistoryId) {
        let mut cursor = self.cursor.lock().await;
        cursor.reset(position);
        if let Err(e) = self.cursors.store_cursor(&self.mailbox, cursor.state()).await {
            error!(error = %e, "Failed to persist ingestion cursor");
        }
    }
}

impl fmt::Debug for IngestionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionEngine")
            .field("mailbox", &self.mailbox)
            .field("classifier", &self.classifier)
            .field("replies", &self.replies)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn record_outcome(report: &mut IngestReport, message_id: &str, outcome: Outcome) {
    match outcome {
        Outcome::Processed(record) => report.processed.push(record),
        Outcome::Skipped(reason) => {
            debug!(%message_id, reason = reason.as_str(), "Skipped message");
            report.skipped.push(SkippedMessage {
                message_id: message_id.to_string(),
                reason: reason.as_str(),
            });
        }
        Outcome::Failed(e) => {
            warn!(%message_id, error = %e, "Failed to process message");
            report.failed.push(FailedMessage {
                message_id: message_id.to_string(),
                error: e.to_string(),
            });
        }
    }
}

async fn join_replies(replies: &mut ReplyTasks) -> usize {
    let mut sent = 0;
    while let Some(joined) = replies.join_next().await {
        match joined {
            Ok(Ok(Some(_))) => sent += 1,
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(error = %e, "Auto-reply failed"),
            Err(e) => error!(error = %e, "Auto-reply task panicked"),
        }
    }
    sent
}
