//! Ingestion cursor: how much mailbox history has been resolved.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::service::HistoryId;

/// Persisted form of the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorState {
    /// Highest history position resolved so far.
    pub position: Option<HistoryId>,
    /// Positions that must be re-resolved, one just below each event whose
    /// message failed or was left to a concurrent invocation.
    pub retry_points: BTreeSet<HistoryId>,
}

impl CursorState {
    /// Lowest outstanding retry point.
    #[must_use]
    pub fn retry_from(&self) -> Option<HistoryId> {
        self.retry_points.first().copied()
    }
}

/// Durable storage for [`CursorState`], keyed by mailbox.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Loads the stored cursor, if any.
    async fn load_cursor(&self, mailbox: &str) -> Result<Option<CursorState>>;

    /// Replaces the stored cursor.
    async fn store_cursor(&self, mailbox: &str, state: &CursorState) -> Result<()>;
}

/// Outcome of one resolved delta, applied with [`IngestionCursor::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaCommit {
    /// Position the delta was resolved from.
    pub started_at: HistoryId,
    /// Highest position the delta covered.
    pub high_water: HistoryId,
    /// Retry points for the events this delta did not confirm.
    pub pinned: BTreeSet<HistoryId>,
}

impl DeltaCommit {
    /// Returns `true` if the event just after `point` lies inside this delta.
    fn covers(&self, point: HistoryId) -> bool {
        self.started_at <= point && point < self.high_water
    }
}

/// Cursor state machine.
///
/// Starts unknown and only ever moves `position` forward. Every event that
/// was not confirmed leaves its own retry point, so the next resolution
/// starts low enough to see it again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestionCursor {
    state: CursorState,
}

impl IngestionCursor {
    /// Creates a cursor from persisted state.
    #[must_use]
    pub const fn new(state: CursorState) -> Self {
        Self { state }
    }

    /// Current state, for persistence.
    #[must_use]
    pub const fn state(&self) -> &CursorState {
        &self.state
    }

    /// Returns `true` until a position is known.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.state.position.is_none()
    }

    /// Where the next resolution should start.
    ///
    /// The lower of the committed position and the lowest retry point; the
    /// notification's own token when nothing is known yet.
    #[must_use]
    pub fn resolve_start(&self, token: HistoryId) -> HistoryId {
        match (self.state.position, self.state.retry_from()) {
            (Some(position), Some(retry)) => position.min(retry),
            (Some(position), None) => position,
            (None, Some(retry)) => retry,
            (None, None) => token,
        }
    }

    /// Applies a resolved delta.
    ///
    /// `position` becomes the maximum of itself and the delta's high-water
    /// mark. Each existing retry point is dropped only if its event lies
    /// inside the delta, since that delta saw the event and either confirmed
    /// it or pinned it again. Points outside the delta are left alone.
    pub fn commit(&mut self, commit: DeltaCommit) {
        self.state.position = Some(
            self.state
                .position
                .map_or(commit.high_water, |p| p.max(commit.high_water)),
        );

        self.state.retry_points.retain(|&point| !commit.covers(point));
        self.state.retry_points.extend(commit.pinned);
    }

    /// Sets the position if none is known yet.
    ///
    /// Returns `true` if the cursor changed.
    pub fn prime(&mut self, position: HistoryId) -> bool {
        if self.state.position.is_some() {
            return false;
        }
        self.state.position = Some(position);
        true
    }

    /// Discards all retry points and restarts from `position`.
    ///
    /// A position already past `position` is kept.
    pub fn reset(&mut self, position: HistoryId) {
        self.state = CursorState {
            position: Some(self.state.position.map_or(position, |p| p.max(position))),
            retry_points: BTreeSet::new(),
        };
    }
}
