//! Dashboard metrics
//!
//! Headline numbers and chart series computed straight from the ledger.

use crate::merger::coerce_value;
use crate::models::{AssetShare, DashboardMetrics, ManagerLoad, MonthlyTotal, TransactionRecord};
use crate::sources::TransactionLedger;
use crate::Result;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Transactions above this value count as high risk
const HIGH_RISK_THRESHOLD: f64 = 100_000.0;

pub async fn load_metrics(ledger: &dyn TransactionLedger) -> Result<DashboardMetrics> {
    let transactions = ledger.fetch_transactions().await?;
    Ok(compute_metrics(&transactions))
}

pub fn compute_metrics(transactions: &[TransactionRecord]) -> DashboardMetrics {
    let values: Vec<f64> = transactions.iter().map(|t| coerce_value(&t.value)).collect();

    let clients: HashSet<&str> = transactions.iter().map(|t| t.client_name.as_str()).collect();
    let managers: HashSet<&str> = transactions
        .iter()
        .map(|t| t.relationship_manager.as_str())
        .collect();

    let total: f64 = values.iter().sum();

    DashboardMetrics {
        top_portfolios: clients.len() as u64,
        total_aum: format_rupees(total),
        active_rms: managers.len() as u64,
        high_risk: values.iter().filter(|v| **v > HIGH_RISK_THRESHOLD).count() as u64,
        portfolio_growth: monthly_totals(transactions, &values),
        asset_allocation: asset_allocation(transactions, &values),
        rm_clients: manager_load(transactions),
    }
}

/// Sum per `YYYY-MM`, oldest month first. Undated rows are left out.
fn monthly_totals(transactions: &[TransactionRecord], values: &[f64]) -> Vec<MonthlyTotal> {
    let mut months: BTreeMap<String, f64> = BTreeMap::new();

    for (tx, value) in transactions.iter().zip(values) {
        let Some(date) = tx
            .transaction_date
            .as_deref()
            .and_then(|d| d.get(..10))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        *months.entry(date.format("%Y-%m").to_string()).or_insert(0.0) += value;
    }

    months
        .into_iter()
        .map(|(month, value)| MonthlyTotal { month, value })
        .collect()
}

/// Percent of the grand total per stock, two decimals
fn asset_allocation(transactions: &[TransactionRecord], values: &[f64]) -> Vec<AssetShare> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, f64> = HashMap::new();

    for (tx, value) in transactions.iter().zip(values) {
        let stock = tx.stock_name.as_str();
        if !totals.contains_key(stock) {
            order.push(stock);
        }
        *totals.entry(stock).or_insert(0.0) += value;
    }

    let grand: f64 = totals.values().sum();
    let grand = if grand == 0.0 { 1.0 } else { grand };

    order
        .into_iter()
        .map(|stock| {
            let share = totals.get(stock).copied().unwrap_or(0.0) * 100.0 / grand;
            AssetShare {
                asset: stock.to_string(),
                percent: (share * 100.0).round() / 100.0,
            }
        })
        .collect()
}

/// Transactions handled per relationship manager
fn manager_load(transactions: &[TransactionRecord]) -> Vec<ManagerLoad> {
    let mut loads: Vec<ManagerLoad> = Vec::new();

    for tx in transactions {
        match loads.iter_mut().find(|l| l.rm == tx.relationship_manager) {
            Some(load) => load.clients += 1,
            None => loads.push(ManagerLoad {
                rm: tx.relationship_manager.clone(),
                clients: 1,
            }),
        }
    }

    loads
}

/// Whole rupees grouped by thousands, e.g. `₹1,234,567`
pub fn format_rupees(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}₹{}", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(client: &str, stock: &str, value: serde_json::Value, date: Option<&str>, rm: &str) -> TransactionRecord {
        TransactionRecord {
            client_name: client.to_string(),
            stock_name: stock.to_string(),
            value,
            transaction_date: date.map(|d| d.to_string()),
            relationship_manager: rm.to_string(),
        }
    }

    fn sample() -> Vec<TransactionRecord> {
        vec![
            tx("Virat Kohli", "Infosys", json!(250000), Some("2024-01-15"), "Neha Shah"),
            tx("KL Rahul", "Infosys", json!("50000"), Some("2024-01-20"), "Neha Shah"),
            tx("Virat Kohli", "TCS", json!(700000), Some("2024-03-02"), "Neha Shah"),
            tx("MS Dhoni", "TCS", json!(0), None, "Ravi Mehra"),
        ]
    }

    #[test]
    fn test_headline_numbers() {
        let metrics = compute_metrics(&sample());

        assert_eq!(metrics.top_portfolios, 3);
        assert_eq!(metrics.active_rms, 2);
        assert_eq!(metrics.high_risk, 2);
        assert_eq!(metrics.total_aum, "₹1,000,000");
    }

    #[test]
    fn test_monthly_growth_sorted() {
        let metrics = compute_metrics(&sample());

        assert_eq!(
            metrics.portfolio_growth,
            vec![
                MonthlyTotal { month: "2024-01".to_string(), value: 300000.0 },
                MonthlyTotal { month: "2024-03".to_string(), value: 700000.0 },
            ]
        );
    }

    #[test]
    fn test_asset_allocation_percentages() {
        let metrics = compute_metrics(&sample());

        assert_eq!(metrics.asset_allocation[0].asset, "Infosys");
        assert_eq!(metrics.asset_allocation[0].percent, 30.0);
        assert_eq!(metrics.asset_allocation[1].percent, 70.0);
    }

    #[test]
    fn test_manager_load() {
        let metrics = compute_metrics(&sample());
        assert_eq!(metrics.rm_clients[0], ManagerLoad { rm: "Neha Shah".to_string(), clients: 3 });
        assert_eq!(metrics.rm_clients[1].clients, 1);
    }

    #[test]
    fn test_empty_ledger() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics.total_aum, "₹0");
        assert!(metrics.asset_allocation.is_empty());
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(999.4), "₹999");
        assert_eq!(format_rupees(1000.0), "₹1,000");
        assert_eq!(format_rupees(123456789.0), "₹123,456,789");
        assert_eq!(format_rupees(-4500.0), "-₹4,500");
    }
}
