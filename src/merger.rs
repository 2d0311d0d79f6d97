//! Data merger
//!
//! Builds the analytic table: every client profile left-joined with its
//! ledger transactions. Recomputed on every query, never cached.

use crate::models::{ClientRecord, MergedRow, TransactionRecord};
use crate::sources::{ClientRegistry, TransactionLedger};
use crate::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Fetch both sources concurrently and merge them.
///
/// Both reads must succeed; a failure in either aborts the merge so a
/// partial join never reaches the caller.
pub async fn merge_dataset(
    registry: &dyn ClientRegistry,
    ledger: &dyn TransactionLedger,
) -> Result<Vec<MergedRow>> {
    let (clients, transactions) =
        tokio::try_join!(registry.fetch_clients(), ledger.fetch_transactions())?;

    info!(
        clients = clients.len(),
        transactions = transactions.len(),
        "Fetched source tables"
    );

    let merged = merge(&clients, &transactions);
    log_activity(&merged);

    Ok(merged)
}

/// Left join clients onto transactions by `client_name`.
///
/// Output order: clients in registry order, each followed by its
/// transactions in ledger order. Transactions naming an unknown client are
/// dropped. Exact duplicate rows are removed, keeping the first.
pub fn merge(clients: &[ClientRecord], transactions: &[TransactionRecord]) -> Vec<MergedRow> {
    let mut by_client: HashMap<&str, Vec<&TransactionRecord>> = HashMap::new();
    for tx in transactions {
        by_client.entry(tx.client_name.as_str()).or_default().push(tx);
    }

    let mut rows = Vec::with_capacity(clients.len().max(transactions.len()));

    for client in clients {
        match by_client.get(client.client_name.as_str()) {
            Some(matched) => {
                rows.extend(matched.iter().map(|tx| joined_row(client, Some(*tx))));
            }
            None => rows.push(joined_row(client, None)),
        }
    }

    dedup_rows(rows)
}

fn joined_row(client: &ClientRecord, tx: Option<&TransactionRecord>) -> MergedRow {
    MergedRow {
        client_name: client.client_name.clone(),
        risk_appetite: client.risk_appetite.to_string(),
        investment_preferences: client.investment_preferences.join(", "),
        client_relationship_manager: client.relationship_manager.clone(),
        address: client.address.clone(),
        stock_name: tx.map(|t| t.stock_name.clone()).unwrap_or_default(),
        value: tx.map(|t| coerce_value(&t.value)).unwrap_or(0.0),
        transaction_date: tx
            .and_then(|t| t.transaction_date.clone())
            .unwrap_or_default(),
        transaction_relationship_manager: tx
            .map(|t| t.relationship_manager.clone())
            .unwrap_or_default(),
    }
}

/// Tolerant numeric parse: numbers pass through, numeric text is parsed,
/// everything else (null, garbage, NaN, infinities) becomes 0.
pub fn coerce_value(raw: &serde_json::Value) -> f64 {
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Bool(_)
        | serde_json::Value::Null
        | serde_json::Value::Array(_)
        | serde_json::Value::Object(_) => None,
    };

    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn dedup_rows(rows: Vec<MergedRow>) -> Vec<MergedRow> {
    let mut seen = HashSet::with_capacity(rows.len());

    rows.into_iter()
        .filter(|row| {
            let mut key = row.cells();
            // -0.0 and 0.0 render differently but are the same value
            key[6] = (row.value + 0.0).to_bits().to_string();
            seen.insert(key)
        })
        .collect()
}

fn log_activity(rows: &[MergedRow]) {
    let mut distinct: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, f64> = HashMap::new();

    for row in rows {
        let total = totals.entry(row.client_name.as_str()).or_insert_with(|| {
            distinct.push(row.client_name.as_str());
            0.0
        });
        *total += row.value;
    }

    let idle: Vec<&str> = distinct
        .iter()
        .copied()
        .filter(|name| totals.get(name).copied().unwrap_or(0.0) == 0.0)
        .collect();

    debug!(
        rows = rows.len(),
        distinct_clients = distinct.len(),
        ?idle,
        "Merged table built"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::models::RiskAppetite;
    use crate::sources::{InMemoryClientRegistry, InMemoryTransactionLedger};
    use serde_json::json;

    fn client(name: &str, prefs: &[&str]) -> ClientRecord {
        ClientRecord {
            client_name: name.to_string(),
            risk_appetite: RiskAppetite::Medium,
            investment_preferences: prefs.iter().map(|p| p.to_string()).collect(),
            relationship_manager: "Neha Shah".to_string(),
            address: "Mumbai".to_string(),
        }
    }

    fn tx(name: &str, stock: &str, value: serde_json::Value) -> TransactionRecord {
        TransactionRecord {
            client_name: name.to_string(),
            stock_name: stock.to_string(),
            value,
            transaction_date: Some("2024-03-01".to_string()),
            relationship_manager: "Neha Shah".to_string(),
        }
    }

    #[test]
    fn test_idle_client_kept_with_zero_value() {
        let clients = vec![client("Alice", &[]), client("Bob", &[])];
        let txs = vec![tx("Alice", "Infosys", json!(100.0))];

        let rows = merge(&clients, &txs);

        assert_eq!(rows.len(), 2);
        let bob = rows.iter().find(|r| r.client_name == "Bob").unwrap();
        assert_eq!(bob.value, 0.0);
        assert_eq!(bob.stock_name, "");
        assert_eq!(bob.transaction_date, "");
    }

    #[test]
    fn test_every_client_appears() {
        let clients: Vec<_> = ["A", "B", "C", "D"].iter().map(|n| client(n, &[])).collect();
        let txs = vec![tx("B", "TCS", json!(5)), tx("B", "Wipro", json!(7))];

        let rows = merge(&clients, &txs);

        for c in &clients {
            assert!(rows.iter().any(|r| r.client_name == c.client_name));
        }
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_value_coercion() {
        assert_eq!(coerce_value(&json!(12.5)), 12.5);
        assert_eq!(coerce_value(&json!("2500000.00")), 2_500_000.0);
        assert_eq!(coerce_value(&json!(" 1000 ")), 1000.0);
        assert_eq!(coerce_value(&json!("1,000")), 0.0);
        assert_eq!(coerce_value(&json!("n/a")), 0.0);
        assert_eq!(coerce_value(&json!(null)), 0.0);
        assert_eq!(coerce_value(&json!("NaN")), 0.0);
        assert_eq!(coerce_value(&json!(true)), 0.0);
    }

    #[test]
    fn test_preferences_flattened() {
        let clients = vec![client("Alice", &["Equity", "Real Estate", "Startups"])];
        let rows = merge(&clients, &[]);
        assert_eq!(rows[0].investment_preferences, "Equity, Real Estate, Startups");
    }

    #[test]
    fn test_orphan_transactions_dropped() {
        let clients = vec![client("Alice", &[])];
        let txs = vec![tx("Ghost", "Infosys", json!(1))];

        let rows = merge(&clients, &txs);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].client_name, "Alice");
    }

    #[test]
    fn test_exact_duplicates_removed() {
        let clients = vec![client("Alice", &[])];
        let txs = vec![
            tx("Alice", "Infosys", json!(100)),
            tx("Alice", "Infosys", json!("100")),
            tx("Alice", "Infosys", json!(200)),
        ];

        let rows = merge(&clients, &txs);
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![100.0, 200.0]);
    }

    #[tokio::test]
    async fn test_merge_dataset_fails_when_ledger_down() {
        let registry = InMemoryClientRegistry::new(vec![client("Alice", &[])]);
        let ledger = InMemoryTransactionLedger::default();
        ledger.set_available(false);

        let result = merge_dataset(&registry, &ledger).await;
        assert!(matches!(result, Err(QueryError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_merge_dataset_sees_fresh_data() {
        let registry = InMemoryClientRegistry::new(vec![client("Alice", &[])]);
        let ledger = InMemoryTransactionLedger::default();

        let before = merge_dataset(&registry, &ledger).await.unwrap();
        assert_eq!(before[0].value, 0.0);

        ledger.append(tx("Alice", "TCS", json!(42))).await;
        let after = merge_dataset(&registry, &ledger).await.unwrap();
        assert_eq!(after[0].value, 42.0);
    }
}
