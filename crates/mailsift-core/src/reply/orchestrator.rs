//! Drafting and sending replies.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use super::compose::compose_reply;
use super::generate::{ReplyGenerator, generate_with_retry};
use super::policy::{FALLBACK_DRAFT, rejection_reason, should_auto_send};
use crate::classify::Category;
use crate::error::bounded;
use crate::record::ProcessedMessage;
use crate::service::{FullMessage, MailboxProvider, SentMessage};
use crate::text::clean_markdown;
use crate::{Error, Result};

/// A generated reply, ready for review or sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyDraft {
    /// Reply body with markdown removed.
    #[serde(rename = "draft")]
    pub text: String,
    /// Category the reply was written for.
    pub label: Category,
}

/// Applies the reply policy, generates reply text and sends it.
#[derive(Clone)]
pub struct ReplyOrchestrator {
    provider: Arc<dyn MailboxProvider>,
    generator: Option<Arc<dyn ReplyGenerator>>,
    timeout: Duration,
    auto_send: bool,
}

impl ReplyOrchestrator {
    /// Creates an orchestrator without a generator; drafting fails until one
    /// is attached with [`Self::with_generator`].
    #[must_use]
    pub fn new(provider: Arc<dyn MailboxProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            generator: None,
            timeout,
            auto_send: true,
        }
    }

    /// Attaches the reply generator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn ReplyGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Enables or disables replies sent during ingestion.
    #[must_use]
    pub fn with_auto_send(mut self, enabled: bool) -> Self {
        self.auto_send = enabled;
        self
    }

    /// Returns `true` if ingestion may send replies on its own.
    #[must_use]
    pub const fn auto_send_enabled(&self) -> bool {
        self.auto_send && self.generator.is_some()
    }

    /// Drafts a reply to `content`.
    ///
    /// # Errors
    ///
    /// - `Error::NotRepliable` if the policy rejects the message.
    /// - `Error::GenerationFailed` or `Error::Timeout` if generation fails.
    pub async fn draft(&self, content: &str, label: Category, confidence: f64) -> Result<ReplyDraft> {
        if let Some(reason) = rejection_reason(label, confidence, &[content]) {
            return Err(Error::NotRepliable(reason));
        }
        self.generate(content, label).await
    }

    /// Sends `draft` as a reply to the message `message_id`.
    ///
    /// Uses the original subject when `subject` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the original cannot be fetched, the reply cannot
    /// be composed, or the provider rejects it.
    pub async fn send_draft(
        &self,
        message_id: &str,
        draft: &str,
        subject: Option<&str>,
    ) -> Result<SentMessage> {
        let original = bounded(
            self.timeout,
            "message fetch",
            self.provider.get_full_message(message_id),
        )
        .await?;
        let subject = subject.unwrap_or(&original.subject);
        self.send(&original, subject, draft).await
    }

    /// Replies to a freshly ingested message if it qualifies.
    ///
    /// Returns `Ok(None)` when no reply is warranted.
    ///
    /// # Errors
    ///
    /// Returns an error if generation or sending fails.
    pub async fn auto_reply(
        &self,
        record: &ProcessedMessage,
        original: &FullMessage,
    ) -> Result<Option<SentMessage>> {
        let label = record.predicted_label;
        let confidence = record.confidence;

        if !self.auto_send_enabled() || !should_auto_send(label, confidence) {
            debug!(message_id = %record.message_id, %label, confidence, "No auto-reply for category");
            return Ok(None);
        }

        let content = format!("{}\n\n{}", record.subject, record.raw_body);
        let texts = [record.normalized_text.as_str(), content.as_str()];
        if let Some(reason) = rejection_reason(label, confidence, &texts) {
            debug!(message_id = %record.message_id, reason, "Message not repliable");
            return Ok(None);
        }

        let draft = self.generate(&content, label).await?;
        let sent = self.send(original, &record.subject, &draft.text).await?;
        info!(message_id = %record.message_id, reply_id = %sent.id, "Auto-reply sent");
        Ok(Some(sent))
    }

    async fn generate(&self, content: &str, label: Category) -> Result<ReplyDraft> {
        let generator = self
            .generator
            .as_deref()
            .ok_or_else(|| Error::GenerationFailed("no reply generator configured".into()))?;

        let raw = generate_with_retry(generator, content, label, self.timeout).await?;
        let cleaned = clean_markdown(&raw);
        let text = match cleaned.trim() {
            "" => FALLBACK_DRAFT.to_string(),
            trimmed => trimmed.to_string(),
        };
        Ok(ReplyDraft { text, label })
    }

    async fn send(&self, original: &FullMessage, subject: &str, body: &str) -> Result<SentMessage> {
        let outgoing = compose_reply(original, subject, body)?;
        bounded(self.timeout, "send", self.provider.send(outgoing)).await
    }
}

impl std::fmt::Debug for ReplyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyOrchestrator")
            .field("generator", &self.generator.as_ref().map(|g| g.name()))
            .field("timeout", &self.timeout)
            .field("auto_send", &self.auto_send)
            .finish_non_exhaustive()
    }
}
