//! Reply text generation with bounded retry on rate limiting.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::classify::Category;
use crate::{Error, Result};

/// Total generation attempts per message.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff unit after a rate-limited attempt; the wait is `unit * attempt`.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(20);

/// Errors reported by a reply generator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator asked the caller to slow down.
    #[error("rate limited")]
    RateLimited,

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Failed(err.to_string())
    }
}

/// External capability producing reply text for a message.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Generates a reply to `content`, written for a message of `label`.
    async fn generate(
        &self,
        content: &str,
        label: Category,
    ) -> std::result::Result<String, GenerationError>;
}

/// Calls `generator` up to [`MAX_ATTEMPTS`] times.
///
/// Only rate limiting is retried, after waiting `20s * attempt`. Each attempt
/// is bounded by `timeout`.
///
/// # Errors
///
/// - `Error::GenerationFailed` on a non rate-limit failure, or when every
///   attempt was rate limited.
/// - `Error::Timeout` if an attempt does not finish in time.
pub async fn generate_with_retry(
    generator: &dyn ReplyGenerator,
    content: &str,
    label: Category,
    timeout: Duration,
) -> Result<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let outcome = tokio::time::timeout(timeout, generator.generate(content, label))
            .await
            .map_err(|_| Error::Timeout {
                operation: "reply generation",
            })?;

        match outcome {
            Ok(text) => return Ok(text),
            Err(GenerationError::RateLimited) if attempt < MAX_ATTEMPTS => {
                let wait = RATE_LIMIT_BACKOFF * attempt;
                warn!(
                    generator = generator.name(),
                    attempt,
                    wait_secs = wait.as_secs(),
                    "Reply generation rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
            }
            Err(GenerationError::RateLimited) => break,
            Err(GenerationError::Failed(reason)) => return Err(Error::GenerationFailed(reason)),
        }
    }

    Err(Error::GenerationFailed(format!(
        "rate limited on all {MAX_ATTEMPTS} attempts"
    )))
}
