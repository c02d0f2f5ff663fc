//! Order-preserving batch classification over a pluggable engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::model::{ClassificationResult, RawScores};
use crate::{Error, Result};

/// Errors reported by a classification engine.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The engine could not produce scores.
    #[error("{0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// A capability that scores texts against [`super::Category::CANDIDATES`].
#[async_trait]
pub trait ClassificationEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Scores each text; the output must have one entry per input, in order.
    async fn score(&self, texts: &[String]) -> std::result::Result<Vec<RawScores>, ClassifyError>;
}

/// Wraps an engine with the batch contract used by ingestion.
#[derive(Clone)]
pub struct ClassificationAdapter {
    engine: Arc<dyn ClassificationEngine>,
    timeout: Duration,
}

impl ClassificationAdapter {
    /// Creates an adapter whose engine calls are bounded by `timeout`.
    #[must_use]
    pub fn new(engine: Arc<dyn ClassificationEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Classifies a batch of texts, one result per text in input order.
    ///
    /// An empty batch returns an empty result without calling the engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::ClassificationUnavailable` if the engine fails or
    /// returns a result count different from the input count, and
    /// `Error::Timeout` if it does not answer in time.
    pub async fn classify(&self, texts: &[String]) -> Result<Vec<ClassificationResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let scores = tokio::time::timeout(self.timeout, self.engine.score(texts))
            .await
            .map_err(|_| Error::Timeout {
                operation: "classification",
            })??;

        if scores.len() != texts.len() {
            return Err(Error::ClassificationUnavailable(format!(
                "{} returned {} results for {} texts",
                self.engine.name(),
                scores.len(),
                texts.len()
            )));
        }

        let results = scores
            .iter()
            .map(|raw| {
                ClassificationResult::from_scores(raw).ok_or_else(|| {
                    Error::ClassificationUnavailable(format!(
                        "{} returned no category scores",
                        self.engine.name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(engine = self.engine.name(), count = results.len(), "Classified batch");
        Ok(results)
    }

    /// Classifies a single text.
    ///
    /// # Errors
    ///
    /// See [`ClassificationAdapter::classify`].
    pub async fn classify_one(&self, text: &str) -> Result<ClassificationResult> {
        self.classify(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::ClassificationUnavailable("empty result".into()))
    }
}

impl std::fmt::Debug for ClassificationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationAdapter")
            .field("engine", &self.engine.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
