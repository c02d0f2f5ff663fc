//! Provider-neutral mailbox types and the [`MailboxProvider`] trait.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailsift_mime::Headers;
use serde::{Deserialize, Serialize};

/// Errors reported by a mailbox provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached or rejected the request.
    #[error("{0}")]
    Unavailable(String),

    /// History before the given start point is no longer retained.
    #[error("history before {0} is no longer available")]
    HistoryExpired(String),

    /// The provider answered with data that could not be interpreted.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<mailsift_gmail::Error> for ProviderError {
    fn from(err: mailsift_gmail::Error) -> Self {
        match err {
            mailsift_gmail::Error::HistoryExpired(start) => Self::HistoryExpired(start),
            mailsift_gmail::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Position in the mailbox change history.
///
/// History identifiers are opaque to clients but increase monotonically, so
/// they are compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(pub u64);

impl HistoryId {
    /// Parse from the provider's decimal string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse().ok().map(Self)
    }

    /// The position just before this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HistoryId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProviderError::InvalidResponse(format!("history id {s:?}")))
    }
}

/// A fetched message with the parts ingestion needs.
#[derive(Debug, Clone, Default)]
pub struct FullMessage {
    /// Provider-assigned identifier.
    pub id: String,
    /// Thread identifier, when the provider groups messages.
    pub thread_id: Option<String>,
    /// Top-level headers.
    pub headers: Headers,
    /// Decoded subject.
    pub subject: String,
    /// Best available text body (plain text preferred, HTML otherwise).
    pub body: String,
    /// Provider-generated preview.
    pub snippet: String,
    /// When the provider received the message.
    pub received_at: Option<DateTime<Utc>>,
}

impl FullMessage {
    /// Sender address header.
    #[must_use]
    pub fn from(&self) -> &str {
        self.headers.get("from").unwrap_or_default()
    }

    /// Recipient address header.
    #[must_use]
    pub fn to(&self) -> &str {
        self.headers.get("to").unwrap_or_default()
    }

    /// RFC 5322 `Message-ID`, when present.
    #[must_use]
    pub fn message_id_header(&self) -> Option<&str> {
        self.headers
            .get("message-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// One message-added event in a history delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAdded {
    /// History record that added the message.
    pub history_id: HistoryId,
    /// The added message.
    pub message_id: String,
}

/// Ordered message-added events after a start position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryDelta {
    /// Events in delivery order; the same message may appear more than once.
    pub events: Vec<MessageAdded>,
    /// Mailbox position at the time the delta was read.
    pub high_water: Option<HistoryId>,
}

/// A raw message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// URL-safe Base64 encoded RFC 5322 message.
    pub raw: String,
    /// Thread to place the message in.
    pub thread_id: Option<String>,
}

/// Acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    /// Identifier of the sent message.
    pub id: String,
}

/// Acknowledgement of a watch registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchAck {
    /// Mailbox position at registration time.
    pub history_id: HistoryId,
    /// Expiration in milliseconds since the epoch.
    pub expiration_ms: Option<i64>,
}

/// A remote mailbox.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Lists message identifiers matching a search query, newest first.
    async fn list_message_ids(&self, query: &str, limit: u32)
    -> Result<Vec<String>, ProviderError>;

    /// Fetches a message with headers and decoded body.
    async fn get_full_message(&self, id: &str) -> Result<FullMessage, ProviderError>;

    /// Lists message-added events after `start`.
    async fn get_history_delta(&self, start: HistoryId) -> Result<HistoryDelta, ProviderError>;

    /// Sends a raw message.
    async fn send(&self, message: OutgoingMessage) -> Result<SentMessage, ProviderError>;

    /// Registers change notifications on a topic.
    async fn register_watch(&self, topic: &str) -> Result<WatchAck, ProviderError>;
}
