//! Error types for Gmail API operations.

/// Result type alias for Gmail API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Gmail API error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with a non-success status.
    #[error("Gmail API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The requested history start point is older than the mailbox retains.
    #[error("History start {0} is no longer available")]
    HistoryExpired(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
