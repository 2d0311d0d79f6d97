//! Postgres-backed source readers
//!
//! Client profiles are stored as JSONB documents; transactions as a plain
//! table. Both create their schema lazily on first use.

use crate::error::QueryError;
use crate::models::{ClientRecord, RiskAppetite, TransactionRecord};
use crate::sources::{ClientRegistry, TransactionLedger};
use crate::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Build a lazily-connecting pool shared by every Postgres-backed store
pub fn lazy_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(database_url)
        .map_err(|e| QueryError::ConfigError(format!("Invalid database URL: {}", e)))
}

fn unavailable(source: &str, e: sqlx::Error) -> QueryError {
    QueryError::SourceUnavailable(format!("{} query failed: {}", source, e))
}

/// A profile that cannot be decoded fails the whole read; dropping it would
/// remove the client from every aggregation.
fn decode_profile(doc: serde_json::Value) -> Result<ClientRecord> {
    serde_json::from_value::<ClientRecord>(doc).map_err(|e| {
        warn!("Malformed client profile: {}", e);
        QueryError::SourceUnavailable(format!("client registry holds a malformed profile: {}", e))
    })
}

// =============================
// Client Registry
// =============================

pub struct PgClientRegistry {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgClientRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS client_profiles (
                      id BIGSERIAL PRIMARY KEY,
                      profile JSONB NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| unavailable("client registry", e))?;

        Ok(())
    }

    async fn fetch_where(&self, filter: &str, bind: Option<String>) -> Result<Vec<ClientRecord>> {
        self.ensure_schema().await?;

        let sql = format!("SELECT profile FROM client_profiles {} ORDER BY id ASC", filter);
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable("client registry", e))?;

        let clients = rows
            .into_iter()
            .map(|row| -> Result<ClientRecord> {
                let doc = row
                    .try_get::<serde_json::Value, _>("profile")
                    .map_err(|e| unavailable("client registry", e))?;
                decode_profile(doc)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = clients.len(), "Fetched client profiles");
        Ok(clients)
    }
}

#[async_trait]
impl ClientRegistry for PgClientRegistry {
    async fn fetch_clients(&self) -> Result<Vec<ClientRecord>> {
        self.fetch_where("", None).await
    }

    async fn clients_by_risk(&self, risk: RiskAppetite) -> Result<Vec<ClientRecord>> {
        self.fetch_where("WHERE profile->>'risk_appetite' = $1", Some(risk.to_string()))
            .await
    }

    async fn clients_by_preference(&self, preference: &str) -> Result<Vec<ClientRecord>> {
        self.fetch_where(
            "WHERE jsonb_exists(profile->'investment_preferences', $1)",
            Some(preference.to_string()),
        )
        .await
    }

    async fn replace_all(&self, clients: &[ClientRecord]) -> Result<()> {
        self.ensure_schema().await?;

        let db_error = |e: sqlx::Error| {
            QueryError::DatabaseError(format!("Failed to replace client profiles: {}", e))
        };

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM client_profiles")
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        for client in clients {
            sqlx::query("INSERT INTO client_profiles (profile) VALUES ($1)")
                .bind(serde_json::to_value(client)?)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

// =============================
// Transaction Ledger
// =============================

pub struct PgTransactionLedger {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgTransactionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS transactions (
                      id BIGSERIAL PRIMARY KEY,
                      client_name TEXT NOT NULL,
                      stock_name TEXT NOT NULL,
                      value NUMERIC,
                      transaction_date DATE,
                      relationship_manager TEXT NOT NULL DEFAULT ''
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| unavailable("transaction ledger", e))?;

        Ok(())
    }
}

#[async_trait]
impl TransactionLedger for PgTransactionLedger {
    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.ensure_schema().await?;

        // value travels as text; numeric coercion belongs to the merger
        let rows = sqlx::query(
            r#"
            SELECT client_name, stock_name, value::text AS value,
                   transaction_date::text AS transaction_date, relationship_manager
            FROM transactions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("transaction ledger", e))?;

        let transactions = rows
            .into_iter()
            .map(|row| -> std::result::Result<TransactionRecord, sqlx::Error> {
                let value: Option<String> = row.try_get("value")?;
                Ok(TransactionRecord {
                    client_name: row.try_get("client_name")?,
                    stock_name: row.try_get("stock_name")?,
                    value: value
                        .map(serde_json::Value::String)
                        .unwrap_or(serde_json::Value::Null),
                    transaction_date: row.try_get("transaction_date")?,
                    relationship_manager: row.try_get("relationship_manager")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| unavailable("transaction ledger", e))?;

        debug!(count = transactions.len(), "Fetched transactions");
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_profile_is_lenient() {
        let lowercase_risk = decode_profile(json!({
            "client_name": "Aamir Khan",
            "risk_appetite": "medium",
            "investment_preferences": ["Mutual Funds", "Bonds"],
            "relationship_manager": "Rajesh Mehta",
            "address": "Mumbai"
        }))
        .unwrap();
        assert_eq!(lowercase_risk.risk_appetite, RiskAppetite::Medium);

        let missing_manager = decode_profile(json!({
            "client_name": "Rishabh Pant",
            "risk_appetite": "Medium"
        }))
        .unwrap();
        assert_eq!(missing_manager.relationship_manager, "");
        assert!(missing_manager.investment_preferences.is_empty());
    }

    #[test]
    fn test_undecodable_profile_fails_the_read() {
        let result = decode_profile(json!({
            "client_name": "Ghost",
            "risk_appetite": "reckless"
        }));
        assert!(matches!(result, Err(QueryError::SourceUnavailable(_))));

        let result = decode_profile(json!({ "risk_appetite": "Low" }));
        assert!(matches!(result, Err(QueryError::SourceUnavailable(_))));
    }
}
