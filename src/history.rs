//! Recent-query history
//!
//! Remembers every question asked, newest first. Backed by Postgres when a
//! database is configured, otherwise by an in-process list.

use crate::error::QueryError;
use crate::models::QueryHistoryEntry;
use crate::tabular::render_csv;
use crate::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;
use uuid::Uuid;

const DISPLAY_FORMAT: &str = "%d-%b %I:%M %p";

enum HistoryBackend {
    InMemory {
        // newest last; reversed on read
        entries: Arc<RwLock<Vec<QueryHistoryEntry>>>,
    },
    Postgres {
        pool: PgPool,
        schema_ready: Arc<OnceCell<()>>,
    },
}

pub struct HistoryStore {
    backend: HistoryBackend,
}

impl HistoryStore {
    pub fn in_memory() -> Self {
        info!("Query history backend: in-memory");
        Self {
            backend: HistoryBackend::InMemory {
                entries: Arc::new(RwLock::new(Vec::new())),
            },
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        info!("Query history backend: postgres");
        Self {
            backend: HistoryBackend::Postgres {
                pool,
                schema_ready: Arc::new(OnceCell::new()),
            },
        }
    }

    async fn ensure_schema_if_needed(&self) -> Result<()> {
        let HistoryBackend::Postgres { pool, schema_ready } = &self.backend else {
            return Ok(());
        };

        schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS recent_queries (
                      id UUID PRIMARY KEY,
                      text TEXT NOT NULL,
                      time_label TEXT NOT NULL,
                      recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| db_error("initialize query history schema", e))?;

        Ok(())
    }

    /// Record a question asked just now
    pub async fn record(&self, text: &str) -> Result<QueryHistoryEntry> {
        let entry = QueryHistoryEntry {
            id: Uuid::new_v4(),
            text: text.to_string(),
            time: Local::now().format(DISPLAY_FORMAT).to_string(),
            recorded_at: Utc::now(),
        };
        self.insert(entry.clone()).await?;
        Ok(entry)
    }

    async fn insert(&self, entry: QueryHistoryEntry) -> Result<()> {
        match &self.backend {
            HistoryBackend::InMemory { entries } => {
                entries.write().await.push(entry);
                Ok(())
            }
            HistoryBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                sqlx::query(
                    "INSERT INTO recent_queries (id, text, time_label, recorded_at) VALUES ($1, $2, $3, $4)",
                )
                .bind(entry.id)
                .bind(&entry.text)
                .bind(&entry.time)
                .bind(entry.recorded_at)
                .execute(pool)
                .await
                .map_err(|e| db_error("insert query history", e))?;

                Ok(())
            }
        }
    }

    /// All entries, newest first
    pub async fn list(&self) -> Result<Vec<QueryHistoryEntry>> {
        match &self.backend {
            HistoryBackend::InMemory { entries } => {
                Ok(entries.read().await.iter().rev().cloned().collect())
            }
            HistoryBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                let rows = sqlx::query(
                    "SELECT id, text, time_label, recorded_at FROM recent_queries ORDER BY recorded_at DESC",
                )
                .fetch_all(pool)
                .await
                .map_err(|e| db_error("load query history", e))?;

                rows.into_iter()
                    .map(|row| -> std::result::Result<QueryHistoryEntry, sqlx::Error> {
                        Ok(QueryHistoryEntry {
                            id: row.try_get("id")?,
                            text: row.try_get("text")?,
                            time: row.try_get("time_label")?,
                            recorded_at: row.try_get("recorded_at")?,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| db_error("decode query history", e))
            }
        }
    }

    /// Delete the entry at `index` in newest-first order
    pub async fn delete(&self, index: usize) -> Result<QueryHistoryEntry> {
        match &self.backend {
            HistoryBackend::InMemory { entries } => {
                let mut entries = entries.write().await;
                let len = entries.len();
                if index >= len {
                    return Err(QueryError::HistoryNotFound(index));
                }
                Ok(entries.remove(len - 1 - index))
            }
            HistoryBackend::Postgres { pool, .. } => {
                let target = self
                    .list()
                    .await?
                    .into_iter()
                    .nth(index)
                    .ok_or(QueryError::HistoryNotFound(index))?;

                let done = sqlx::query("DELETE FROM recent_queries WHERE id = $1")
                    .bind(target.id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("delete query history entry", e))?;

                ensure_removed(done.rows_affected(), index)?;
                Ok(target)
            }
        }
    }

    /// Remove everything; returns how many entries were deleted
    pub async fn clear(&self) -> Result<u64> {
        match &self.backend {
            HistoryBackend::InMemory { entries } => {
                let mut entries = entries.write().await;
                let count = entries.len() as u64;
                entries.clear();
                Ok(count)
            }
            HistoryBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                let done = sqlx::query("DELETE FROM recent_queries")
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("clear query history", e))?;

                Ok(done.rows_affected())
            }
        }
    }

    /// `Query,Timestamp` CSV, newest first
    pub async fn export_csv(&self) -> Result<String> {
        let entries = self.list().await?;
        Ok(render_csv(
            &["Query", "Timestamp"],
            entries.iter().map(|e| [e.text.as_str(), e.time.as_str()]),
        ))
    }

    /// Entries recorded on any day from `start` through `end` (`YYYY-MM-DD`)
    pub async fn filter(&self, start: &str, end: &str) -> Result<Vec<QueryHistoryEntry>> {
        let start = parse_day(start)?;
        let end = parse_day(end)?;
        if start > end {
            return Err(QueryError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|entry| within(entry.recorded_at, start, end))
            .collect())
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| QueryError::InvalidDateRange(format!("'{}': {}", raw, e)))
}

fn within(at: DateTime<Utc>, start: NaiveDate, end: NaiveDate) -> bool {
    let day = at.with_timezone(&Local).date_naive();
    start <= day && day <= end
}

/// Zero affected rows means the entry vanished between the read and the
/// delete
fn ensure_removed(affected: u64, index: usize) -> Result<()> {
    if affected == 0 {
        return Err(QueryError::HistoryNotFound(index));
    }
    Ok(())
}

fn db_error(action: &str, e: sqlx::Error) -> QueryError {
    QueryError::DatabaseError(format!("Failed to {}: {}", action, e))
}
