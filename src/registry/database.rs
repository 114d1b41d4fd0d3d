//! Batch Event Registry Module
//!
//! Persists every batch notification the chain emits so relayers and
//! auditors can look up the history of a nonce after the batch record
//! itself has been deleted from state.
//!
//! # Storage
//! One row per notification in `batch_events`:
//! - home height, event kind, batch nonce
//! - all attributes as a JSON object
//! - wall-clock time the row was written

use crate::events::{Event, ATTRIBUTE_KEY_NONCE};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::debug;

/// A notification as read back from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub height: u64,
    pub kind: String,
    pub nonce: u64,
    pub attributes: BTreeMap<String, String>,
    pub recorded_at: String,
}

/// Batch event registry backed by SQLite
#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    /// Connect to the database and create the schema if needed
    ///
    /// # Arguments
    /// * `url` - Database URL, e.g. `sqlite://registry.db` or `sqlite::memory:`
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // A single connection keeps `sqlite::memory:` databases alive and shared.
        let pool = SqlitePoolOptions::new().max_connections(1).connect(url).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS batch_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                height INTEGER NOT NULL,
                kind TEXT NOT NULL,
                nonce INTEGER NOT NULL,
                attributes TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Store the notifications emitted at `height`
    ///
    /// # Returns
    /// The number of rows written
    pub async fn store(&self, height: u64, events: &[Event]) -> anyhow::Result<usize> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for event in events {
            let nonce: i64 = event
                .attribute(ATTRIBUTE_KEY_NONCE)
                .and_then(|n| n.parse().ok())
                .unwrap_or_default();
            let attributes: BTreeMap<&str, &str> = event
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            sqlx::query(
                "INSERT INTO batch_events (height, kind, nonce, attributes, recorded_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(height as i64)
            .bind(event.kind.as_str())
            .bind(nonce)
            .bind(serde_json::to_string(&attributes)?)
            .bind(recorded_at.clone())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(height, count = events.len(), "batch events recorded");
        Ok(events.len())
    }

    /// Every recorded notification for batch `nonce`, oldest first
    pub async fn events_for_nonce(&self, nonce: u64) -> anyhow::Result<Vec<RecordedEvent>> {
        let rows = sqlx::query(
            "SELECT height, kind, nonce, attributes, recorded_at
             FROM batch_events WHERE nonce = ? ORDER BY id",
        )
        .bind(nonce as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> anyhow::Result<RecordedEvent> {
                let attributes: String = row.try_get("attributes")?;
                Ok(RecordedEvent {
                    height: row.try_get::<i64, _>("height")? as u64,
                    kind: row.try_get("kind")?,
                    nonce: row.try_get::<i64, _>("nonce")? as u64,
                    attributes: serde_json::from_str(&attributes)?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    /// Total number of recorded notifications
    pub async fn count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batch_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
