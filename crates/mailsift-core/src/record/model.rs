//! Record data models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{Category, ClassificationResult, Priority, Sentiment};

/// A message that has been normalized, classified and persisted.
///
/// Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedMessage {
    /// Surrogate identity assigned by the store.
    pub id: i64,
    /// Provider-assigned message identifier.
    pub message_id: String,
    /// Subject as received.
    pub subject: String,
    /// Body as received.
    pub raw_body: String,
    /// Display form of the body.
    pub normalized_text: String,
    /// Classifier input.
    pub model_text: String,
    /// Predicted category.
    pub predicted_label: Category,
    /// Confidence of the prediction.
    pub confidence: f64,
    /// Detected sentiment.
    pub sentiment: Sentiment,
    /// Derived priority.
    pub priority: Priority,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl ProcessedMessage {
    /// The classification this record was created with.
    #[must_use]
    pub const fn classification(&self) -> ClassificationResult {
        ClassificationResult {
            label: self.predicted_label,
            confidence: self.confidence,
            sentiment: self.sentiment,
            priority: self.priority,
        }
    }
}

/// Data for a record that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Provider-assigned message identifier.
    pub message_id: String,
    /// Subject as received.
    pub subject: String,
    /// Body as received.
    pub raw_body: String,
    /// Display form of the body.
    pub normalized_text: String,
    /// Classifier input.
    pub model_text: String,
    /// Classification outcome.
    pub classification: ClassificationResult,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}
