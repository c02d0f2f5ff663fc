//! Error types for the core library.

use thiserror::Error;

use crate::classify::ClassifyError;
use crate::reply::GenerationError;
use crate::service::ProviderError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Mailbox provider fetch/list/send failed.
    #[error("Mailbox provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The history start point is older than the provider retains.
    #[error("History cursor {0} expired")]
    CursorExpired(String),

    /// Reply generation failed, including when every attempt was rate limited.
    #[error("Reply generation failed: {0}")]
    GenerationFailed(String),

    /// The message does not qualify for an automated reply.
    #[error("Message is not repliable: {0}")]
    NotRepliable(&'static str),

    /// The classification capability could not produce a result.
    #[error("Classification unavailable: {0}")]
    ClassificationUnavailable(String),

    /// A push notification envelope was missing or malformed.
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// A record for this message already exists.
    #[error("Duplicate record for message {0}")]
    DuplicateRecord(String),

    /// An external call exceeded its time bound.
    #[error("Timed out during {operation}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Message composition error.
    #[error("Message composition error: {0}")]
    Mime(#[from] mailsift_mime::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::HistoryExpired(start) => Self::CursorExpired(start),
            other => Self::ProviderUnavailable(other.to_string()),
        }
    }
}

impl From<ClassifyError> for Error {
    fn from(err: ClassifyError) -> Self {
        Self::ClassificationUnavailable(err.to_string())
    }
}

impl From<GenerationError> for Error {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Failed(reason) => Self::GenerationFailed(reason),
            rate_limited @ GenerationError::RateLimited => {
                Self::GenerationFailed(rate_limited.to_string())
            }
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Runs an external call, bounding it by `timeout`.
pub(crate) async fn bounded<T, E>(
    timeout: std::time::Duration,
    operation: &'static str,
    call: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    E: Into<Error>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome.map_err(Into::into),
        Err(_) => Err(Error::Timeout { operation }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_errors_surface_as_generation_failed() {
        let err = Error::from(GenerationError::RateLimited);
        assert!(matches!(&err, Error::GenerationFailed(reason) if reason == "rate limited"));

        let err = Error::from(GenerationError::Failed("bad key".into()));
        assert_eq!(err.to_string(), "Reply generation failed: bad key");
    }

    #[test]
    fn test_history_expiry_is_not_a_provider_outage() {
        let err = Error::from(ProviderError::HistoryExpired("7".into()));
        assert!(matches!(err, Error::CursorExpired(start) if start == "7"));
    }
}
