//! Fan-out of processed messages to live subscribers.
//!
//! Backed by a bounded `tokio::sync::broadcast` channel: publishing never
//! waits, each subscriber has its own queue, and a subscriber that falls
//! behind skips the events it missed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::classify::{Category, Priority, Sentiment};
use crate::record::ProcessedMessage;
use crate::text::{ELLIPSIS, truncate_chars};

/// Default per-subscriber queue length.
pub const DEFAULT_CAPACITY: usize = 256;

/// Maximum body characters carried by an event.
pub const SNIPPET_LIMIT: usize = 200;

/// Which side of the mailbox a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxKind {
    /// Received mail.
    Inbox,
    /// Mail sent by the account owner.
    Sent,
}

/// A newly processed message, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEvent {
    /// Provider message id.
    pub message_id: String,
    /// Subject as received.
    pub subject: String,
    /// Body snippet.
    pub body: String,
    /// Predicted category.
    pub predicted_label: Category,
    /// Prediction confidence.
    pub confidence: f64,
    /// Detected sentiment.
    pub sentiment: Sentiment,
    /// Derived priority.
    pub priority: Priority,
    /// Sender.
    pub from: String,
    /// Recipients.
    pub to: String,
    /// Mailbox the message arrived in.
    #[serde(rename = "type")]
    pub kind: MailboxKind,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl MessageEvent {
    /// Builds an event from a stored record and its address headers.
    #[must_use]
    pub fn new(record: &ProcessedMessage, from: &str, to: &str) -> Self {
        Self {
            message_id: record.message_id.clone(),
            subject: record.subject.clone(),
            body: snippet(&record.raw_body),
            predicted_label: record.predicted_label,
            confidence: record.confidence,
            sentiment: record.sentiment,
            priority: record.priority,
            from: from.to_string(),
            to: to.to_string(),
            kind: MailboxKind::Inbox,
            received_at: record.received_at,
        }
    }
}

fn snippet(body: &str) -> String {
    match truncate_chars(body, SNIPPET_LIMIT) {
        (cut, true) => format!("{cut}{ELLIPSIS}"),
        (whole, false) => whole.to_string(),
    }
}

/// Publishing side of the channel.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<MessageEvent>,
}

impl Broadcaster {
    /// Creates a channel where each subscriber buffers up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends an event to every current subscriber.
    ///
    /// Returns the number of subscribers that will see it; zero is normal.
    pub fn publish(&self, event: MessageEvent) -> usize {
        let message_id = event.message_id.clone();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(%message_id, subscribers = count, "Broadcast message event");
                count
            }
            Err(_) => 0,
        }
    }

    /// Registers a new subscriber that sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving side owned by one subscriber.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<MessageEvent>,
}

impl Subscription {
    /// Waits for the next event, skipping over any this subscriber missed.
    ///
    /// Returns `None` once the broadcaster is gone.
    pub async fn next(&mut self) -> Option<MessageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(count, "Subscriber lagged behind message events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Converts into the underlying receiver, for stream adapters.
    #[must_use]
    pub fn into_inner(self) -> broadcast::Receiver<MessageEvent> {
        self.receiver
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(message_id: &str, body: &str) -> ProcessedMessage {
        ProcessedMessage {
            id: 1,
            message_id: message_id.to_string(),
            subject: "Hello".to_string(),
            raw_body: body.to_string(),
            normalized_text: body.to_string(),
            model_text: String::new(),
            predicted_label: Category::Personal,
            confidence: 0.9,
            sentiment: Sentiment::Positive,
            priority: Priority::Low,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_snippet_is_capped() {
        let long = "é".repeat(250);
        let event = MessageEvent::new(&record("m1", &long), "a@x.com", "b@x.com");
        assert_eq!(event.body.chars().count(), SNIPPET_LIMIT + ELLIPSIS.len());
        assert!(event.body.ends_with(ELLIPSIS));

        let short = MessageEvent::new(&record("m2", "short body"), "", "");
        assert_eq!(short.body, "short body");
    }

    #[test]
    fn test_event_serializes_type_field() {
        let event = MessageEvent::new(&record("m1", "hi"), "a@x.com", "b@x.com");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "inbox");
        assert_eq!(json["predicted_label"], "personal");
        assert_eq!(json["from"], "a@x.com");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::default();
        let event = MessageEvent::new(&record("m1", "hi"), "", "");
        assert_eq!(broadcaster.publish(event), 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_each_subscriber() {
        let broadcaster = Broadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        let event = MessageEvent::new(&record("m1", "hi"), "", "");
        assert_eq!(broadcaster.publish(event.clone()), 2);

        assert_eq!(first.next().await.unwrap(), event);
        assert_eq!(second.next().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_missed_events() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe();

        for id in ["m1", "m2", "m3", "m4"] {
            broadcaster.publish(MessageEvent::new(&record(id, ""), "", ""));
        }

        assert_eq!(slow.next().await.unwrap().message_id, "m3");
        assert_eq!(slow.next().await.unwrap().message_id, "m4");
    }

    #[tokio::test]
    async fn test_closed_channel_ends_subscription() {
        let broadcaster = Broadcaster::new(2);
        let mut subscription = broadcaster.subscribe();
        drop(broadcaster);
        assert!(subscription.next().await.is_none());
    }
}
