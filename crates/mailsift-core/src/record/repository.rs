//! `SQLite` repository for processed messages and the ingestion cursor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::model::{NewRecord, ProcessedMessage};
use crate::classify::{Category, Priority, Sentiment};
use crate::ingest::{CursorState, CursorStore};
use crate::service::HistoryId;
use crate::{Error, Result};

/// Append-only store of processed messages.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns `true` if a record exists for `message_id`.
    async fn exists(&self, message_id: &str) -> Result<bool>;

    /// Persists a new record and returns it with its assigned identity.
    async fn save(&self, record: NewRecord) -> Result<ProcessedMessage>;
}

/// Repository for processed messages and cursor state.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
}

impl RecordRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS processed_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL UNIQUE,
                subject TEXT NOT NULL,
                raw_body TEXT NOT NULL,
                normalized_text TEXT NOT NULL,
                model_text TEXT NOT NULL,
                predicted_label TEXT NOT NULL,
                confidence REAL NOT NULL,
                sentiment TEXT NOT NULL,
                priority TEXT NOT NULL,
                received_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Newest-first listing
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_processed_messages_received
            ON processed_messages(received_at DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ingestion_cursor (
                mailbox TEXT PRIMARY KEY,
                position TEXT,
                retry_points TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a record by provider message id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, message_id: &str) -> Result<Option<ProcessedMessage>> {
        let row = sqlx::query(
            r"
            SELECT id, message_id, subject, raw_body, normalized_text, model_text,
                   predicted_label, confidence, sentiment, priority, received_at
            FROM processed_messages
            WHERE message_id = ?
            ",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_record))
    }

    /// List the most recently received records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ProcessedMessage>> {
        let rows = sqlx::query(
            r"
            SELECT id, message_id, subject, raw_body, normalized_text, model_text,
                   predicted_label, confidence, sentiment, priority, received_at
            FROM processed_messages
            ORDER BY received_at DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    /// Count stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM processed_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(row.get::<i64, _>("count")).unwrap_or_default())
    }
}

#[async_trait]
impl RecordStore for RecordRepository {
    async fn exists(&self, message_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM processed_messages WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn save(&self, record: NewRecord) -> Result<ProcessedMessage> {
        let classification = record.classification;

        let result = sqlx::query(
            r"
            INSERT INTO processed_messages (
                message_id, subject, raw_body, normalized_text, model_text,
                predicted_label, confidence, sentiment, priority, received_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.message_id)
        .bind(&record.subject)
        .bind(&record.raw_body)
        .bind(&record.normalized_text)
        .bind(&record.model_text)
        .bind(classification.label.as_str())
        .bind(classification.confidence)
        .bind(classification.sentiment.as_str())
        .bind(classification.priority.as_str())
        .bind(record.received_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::DuplicateRecord(record.message_id.clone())
            }
            other => Error::Database(other),
        })?;

        Ok(ProcessedMessage {
            id: result.last_insert_rowid(),
            message_id: record.message_id,
            subject: record.subject,
            raw_body: record.raw_body,
            normalized_text: record.normalized_text,
            model_text: record.model_text,
            predicted_label: classification.label,
            confidence: classification.confidence,
            sentiment: classification.sentiment,
            priority: classification.priority,
            received_at: record.received_at,
        })
    }
}

#[async_trait]
impl CursorStore for RecordRepository {
    async fn load_cursor(&self, mailbox: &str) -> Result<Option<CursorState>> {
        let row = sqlx::query(
            r"
            SELECT position, retry_points
            FROM ingestion_cursor
            WHERE mailbox = ?
            ",
        )
        .bind(mailbox)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let retry_points: String = row.get("retry_points");

        Ok(Some(CursorState {
            position: row
                .get::<Option<String>, _>("position")
                .as_deref()
                .and_then(HistoryId::parse),
            retry_points: serde_json::from_str(&retry_points)?,
        }))
    }

    async fn store_cursor(&self, mailbox: &str, state: &CursorState) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO ingestion_cursor (mailbox, position, retry_points, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(mailbox) DO UPDATE SET
                position = excluded.position,
                retry_points = excluded.retry_points,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(mailbox)
        .bind(state.position.map(|h| h.to_string()))
        .bind(serde_json::to_string(&state.retry_points)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Convert a database row to a `ProcessedMessage`.
fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> ProcessedMessage {
    let received_at: String = row.get("received_at");

    ProcessedMessage {
        id: row.get("id"),
        message_id: row.get("message_id"),
        subject: row.get("subject"),
        raw_body: row.get("raw_body"),
        normalized_text: row.get("normalized_text"),
        model_text: row.get("model_text"),
        predicted_label: Category::parse(row.get("predicted_label")),
        confidence: row.get("confidence"),
        sentiment: Sentiment::parse(row.get("sentiment")),
        priority: Priority::parse(row.get("priority")),
        received_at: DateTime::parse_from_rfc3339(&received_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;
    use crate::classify::ClassificationResult;

    fn new_record(message_id: &str, minute: u32) -> NewRecord {
        NewRecord {
            message_id: message_id.to_string(),
            subject: "Quarterly report".to_string(),
            raw_body: "<p>Report attached.</p>".to_string(),
            normalized_text: "Report attached.".to_string(),
            model_text: "quarterly report report attached".to_string(),
            classification: ClassificationResult {
                label: Category::Business,
                confidence: 0.85,
                sentiment: Sentiment::Positive,
                priority: Priority::Low,
            },
            received_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_save_and_exists() {
        let repo = RecordRepository::in_memory().await.unwrap();
        assert!(!repo.exists("m1").await.unwrap());

        let saved = repo.save(new_record("m1", 0)).await.unwrap();
        assert!(saved.id > 0);
        assert_eq!(saved.predicted_label, Category::Business);
        assert!(repo.exists("m1").await.unwrap());

        let loaded = repo.get("m1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_duplicate_save_is_rejected() {
        let repo = RecordRepository::in_memory().await.unwrap();
        repo.save(new_record("m1", 0)).await.unwrap();

        let err = repo.save(new_record("m1", 1)).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateRecord(ref id) if id == "m1"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let repo = RecordRepository::in_memory().await.unwrap();
        repo.save(new_record("old", 0)).await.unwrap();
        repo.save(new_record("new", 30)).await.unwrap();
        repo.save(new_record("mid", 15)).await.unwrap();

        let ids: Vec<String> = repo
            .list_recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn test_cursor_roundtrip() {
        let repo = RecordRepository::in_memory().await.unwrap();
        assert!(repo.load_cursor("me").await.unwrap().is_none());

        let state = CursorState {
            position: Some(HistoryId(1200)),
            retry_points: [HistoryId(1150), HistoryId(1180)].into(),
        };
        repo.store_cursor("me", &state).await.unwrap();
        assert_eq!(repo.load_cursor("me").await.unwrap(), Some(state));

        let cleared = CursorState {
            position: Some(HistoryId(1300)),
            retry_points: BTreeSet::new(),
        };
        repo.store_cursor("me", &cleared).await.unwrap();
        assert_eq!(repo.load_cursor("me").await.unwrap(), Some(cleared));
        assert!(repo.load_cursor("other").await.unwrap().is_none());
    }
}
