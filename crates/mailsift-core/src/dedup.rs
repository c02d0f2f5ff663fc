//! Duplicate suppression within and across ingestion invocations.
//!
//! Three checks, in order:
//!
//! 1. The invocation's own [`BatchDedupSet`] catches a message referenced
//!    more than once by the same delta.
//! 2. An engine-wide claim set catches a message another invocation is
//!    processing right now.
//! 3. The [`RecordStore`] catches anything already persisted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::Result;
use crate::record::RecordStore;

/// Message ids seen by one invocation.
#[derive(Debug, Default)]
pub struct BatchDedupSet {
    seen: HashSet<String>,
}

impl BatchDedupSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message_id`, returning `false` if it was already present.
    pub fn insert(&mut self, message_id: &str) -> bool {
        self.seen.insert(message_id.to_string())
    }

    /// Number of distinct ids seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if nothing has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Why a message was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Referenced earlier in the same delta.
    DuplicateInBatch,
    /// A record already exists.
    AlreadyProcessed,
    /// Another invocation holds the message.
    InFlight,
}

impl SkipReason {
    /// Short name for logs and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateInBatch => "duplicate_in_batch",
            Self::AlreadyProcessed => "already_processed",
            Self::InFlight => "in_flight",
        }
    }
}

/// Outcome of [`DedupGuard::check`].
#[derive(Debug)]
pub enum DedupDecision {
    /// Process the message; the claim is held until dropped.
    Proceed(Claim),
    /// Do not process the message.
    Skip(SkipReason),
}

/// Exclusive hold on a message id, released on drop.
#[derive(Debug)]
pub struct Claim {
    message_id: String,
    claims: Arc<Mutex<HashSet<String>>>,
}

impl Claim {
    /// The claimed message id.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.message_id);
    }
}

/// Decides whether a message should be processed.
#[derive(Clone)]
pub struct DedupGuard {
    store: Arc<dyn RecordStore>,
    claims: Arc<Mutex<HashSet<String>>>,
}

impl DedupGuard {
    /// Creates a guard backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            claims: Arc::default(),
        }
    }

    /// Checks one candidate and records it in `batch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails; the claim is released.
    pub async fn check(&self, batch: &mut BatchDedupSet, message_id: &str) -> Result<DedupDecision> {
        if !batch.insert(message_id) {
            return Ok(DedupDecision::Skip(SkipReason::DuplicateInBatch));
        }

        let Some(claim) = self.try_claim(message_id) else {
            return Ok(DedupDecision::Skip(SkipReason::InFlight));
        };

        if self.store.exists(message_id).await? {
            return Ok(DedupDecision::Skip(SkipReason::AlreadyProcessed));
        }

        Ok(DedupDecision::Proceed(claim))
    }

    /// Number of messages currently claimed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn try_claim(&self, message_id: &str) -> Option<Claim> {
        let inserted = self
            .claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(message_id.to_string());

        inserted.then(|| Claim {
            message_id: message_id.to_string(),
            claims: Arc::clone(&self.claims),
        })
    }
}

impl std::fmt::Debug for DedupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupGuard")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::RecordRepository;

    async fn guard() -> (DedupGuard, Arc<RecordRepository>) {
        let repo = Arc::new(RecordRepository::in_memory().await.unwrap());
        (DedupGuard::new(repo.clone()), repo)
    }

    fn skipped(decision: &DedupDecision) -> Option<SkipReason> {
        match decision {
            DedupDecision::Skip(reason) => Some(*reason),
            DedupDecision::Proceed(_) => None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_in_batch() {
        let (guard, _) = guard().await;
        let mut batch = BatchDedupSet::new();

        let first = guard.check(&mut batch, "a").await.unwrap();
        assert!(skipped(&first).is_none());
        let second = guard.check(&mut batch, "a").await.unwrap();
        assert_eq!(skipped(&second), Some(SkipReason::DuplicateInBatch));
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_across_batches() {
        let (guard, _) = guard().await;
        let mut first_batch = BatchDedupSet::new();
        let mut second_batch = BatchDedupSet::new();

        let held = guard.check(&mut first_batch, "a").await.unwrap();
        let other = guard.check(&mut second_batch, "a").await.unwrap();
        assert_eq!(skipped(&other), Some(SkipReason::InFlight));
        assert_eq!(guard.in_flight(), 1);

        drop(held);
        assert_eq!(guard.in_flight(), 0);

        let mut third_batch = BatchDedupSet::new();
        let again = guard.check(&mut third_batch, "a").await.unwrap();
        assert!(skipped(&again).is_none());
    }

    #[tokio::test]
    async fn test_already_processed_releases_claim() {
        use crate::classify::{Category, ClassificationResult, Priority, Sentiment};
        use crate::record::NewRecord;

        let (guard, repo) = guard().await;
        repo.save(NewRecord {
            message_id: "done".to_string(),
            subject: String::new(),
            raw_body: String::new(),
            normalized_text: String::new(),
            model_text: String::new(),
            classification: ClassificationResult {
                label: Category::Personal,
                confidence: 0.9,
                sentiment: Sentiment::Neutral,
                priority: Priority::Medium,
            },
            received_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let mut batch = BatchDedupSet::new();
        let decision = guard.check(&mut batch, "done").await.unwrap();
        assert_eq!(skipped(&decision), Some(SkipReason::AlreadyProcessed));
        assert_eq!(guard.in_flight(), 0);
    }
}
