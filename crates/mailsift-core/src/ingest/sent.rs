//! Read-only view of mail sent from the account.

use serde::Serialize;

use crate::broadcast::MailboxKind;
use crate::classify::{Priority, Sentiment};
use crate::service::FullMessage;
use crate::text::normalize;

/// Search query for messages sent by the account owner.
pub const SENT_QUERY: &str = "from:me";

/// Label reported for sent mail, which is never classified.
pub const SENT_LABEL: &str = "sent";

/// A sent message, normalized for display but never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentSummary {
    /// Provider message id.
    pub message_id: String,
    /// Subject as sent.
    pub subject: String,
    /// Body as sent.
    pub body: String,
    /// Display form of the body.
    pub normalized_text: String,
    /// Classifier-input form of subject and body.
    pub model_text: String,
    /// Always [`SENT_LABEL`].
    pub predicted_label: &'static str,
    /// Always `1.0`.
    pub confidence: f64,
    /// Always neutral.
    pub sentiment: Sentiment,
    /// Always medium.
    pub priority: Priority,
    /// Sender.
    pub from: String,
    /// Recipients.
    pub to: String,
    /// Always [`MailboxKind::Sent`].
    #[serde(rename = "type")]
    pub kind: MailboxKind,
}

impl From<&FullMessage> for SentSummary {
    fn from(message: &FullMessage) -> Self {
        let text = normalize(&message.subject, &message.body);
        Self {
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            normalized_text: text.display_text,
            model_text: text.model_text,
            predicted_label: SENT_LABEL,
            confidence: 1.0,
            sentiment: Sentiment::Neutral,
            priority: Priority::Medium,
            from: message.from().to_string(),
            to: message.to().to_string(),
            kind: MailboxKind::Sent,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_sent_message() {
        let message = FullMessage {
            id: "s1".into(),
            headers: [("From", "me@example.com"), ("To", "Ana <ana@example.com>")]
                .into_iter()
                .collect(),
            subject: "Re: Lunch".into(),
            body: "<p>Sounds good &mdash; see you at noon.</p>".into(),
            ..FullMessage::default()
        };

        let summary = SentSummary::from(&message);

        assert_eq!(summary.normalized_text, "Sounds good \u{2014} see you at noon.");
        assert_eq!(summary.model_text, "lunch sounds good see noon");
        assert_eq!(summary.to, "Ana <ana@example.com>");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "sent");
        assert_eq!(json["predicted_label"], "sent");
        assert_eq!(json["confidence"], 1.0);
        assert_eq!(json["sentiment"], "neutral");
        assert_eq!(json["priority"], "medium");
    }
}
