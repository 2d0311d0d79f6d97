//! Fast-path aggregators
//!
//! Deterministic group/sum/sort routines over the merged table. Pure: no
//! I/O, no mutation of the input.

use crate::error::QueryError;
use crate::models::MergedRow;
use crate::Result;
use std::collections::HashMap;

/// Ordered `(client, summed value)` pairs
pub type Ranking = Vec<(String, f64)>;

const TOP_PORTFOLIO_COUNT: usize = 5;

/// Sum `value` per client, in order of first appearance
fn sum_by_client<'a>(rows: impl IntoIterator<Item = &'a MergedRow>) -> Ranking {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut ranking: Ranking = Vec::new();

    for row in rows {
        match index.get(row.client_name.as_str()) {
            Some(&i) => ranking[i].1 += row.value,
            None => {
                index.insert(row.client_name.as_str(), ranking.len());
                ranking.push((row.client_name.clone(), row.value));
            }
        }
    }

    ranking
}

/// Stable descending sort; equal sums keep their first-appearance order
fn sort_descending(ranking: &mut Ranking) {
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
}

pub fn top_five_portfolios(rows: &[MergedRow]) -> Ranking {
    let mut ranking = sum_by_client(rows);
    sort_descending(&mut ranking);
    ranking.truncate(TOP_PORTFOLIO_COUNT);
    ranking
}

/// One entry per client, idle clients included at zero
pub fn total_per_client(rows: &[MergedRow]) -> Ranking {
    sum_by_client(rows)
}

/// Holders of `stock` (case-insensitive), largest position first.
///
/// Returns `NoMatchingData` when nobody holds the stock, so callers can
/// tell "no holders" apart from holders with zero value.
pub fn stock_holders(rows: &[MergedRow], stock: &str) -> Result<Ranking> {
    let wanted = stock.to_lowercase();
    let holdings: Vec<&MergedRow> = rows
        .iter()
        .filter(|row| row.stock_name.to_lowercase() == wanted)
        .collect();

    if holdings.is_empty() {
        return Err(QueryError::NoMatchingData(stock.to_string()));
    }

    let mut ranking = sum_by_client(holdings);
    sort_descending(&mut ranking);
    Ok(ranking)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(client: &str, stock: &str, value: f64) -> MergedRow {
        MergedRow {
            client_name: client.to_string(),
            risk_appetite: "High".to_string(),
            investment_preferences: String::new(),
            client_relationship_manager: "Neha Shah".to_string(),
            address: String::new(),
            stock_name: stock.to_string(),
            value,
            transaction_date: String::new(),
            transaction_relationship_manager: String::new(),
        }
    }

    fn names(ranking: &Ranking) -> Vec<&str> {
        ranking.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn test_top_five_sorted_and_truncated() {
        let rows = vec![
            row("A", "TCS", 10.0),
            row("B", "TCS", 60.0),
            row("C", "TCS", 30.0),
            row("A", "Infosys", 45.0),
            row("D", "TCS", 5.0),
            row("E", "TCS", 70.0),
            row("F", "TCS", 1.0),
        ];

        let top = top_five_portfolios(&rows);

        assert_eq!(top.len(), 5);
        assert_eq!(names(&top), vec!["E", "B", "A", "C", "D"]);
        assert_eq!(top[2].1, 55.0);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_top_five_ties_keep_first_appearance_order() {
        let rows: Vec<_> = ["G", "F", "E", "D", "C", "B", "A"]
            .iter()
            .map(|n| row(n, "TCS", 100.0))
            .collect();

        let top = top_five_portfolios(&rows);
        assert_eq!(names(&top), vec!["G", "F", "E", "D", "C"]);
    }

    #[test]
    fn test_top_five_with_fewer_clients() {
        let rows = vec![row("A", "TCS", 1.0), row("B", "", 0.0)];
        assert_eq!(top_five_portfolios(&rows).len(), 2);
    }

    #[test]
    fn test_total_per_client_includes_idle() {
        let rows = vec![
            row("A", "TCS", 10.0),
            row("B", "", 0.0),
            row("A", "Wipro", 15.5),
        ];

        let totals = total_per_client(&rows);

        assert_eq!(totals, vec![("A".to_string(), 25.5), ("B".to_string(), 0.0)]);
        let grand: f64 = totals.iter().map(|(_, v)| v).sum();
        let raw: f64 = rows.iter().map(|r| r.value).sum();
        assert_eq!(grand, raw);
    }

    #[test]
    fn test_total_per_client_keeps_registry_order() {
        let rows = vec![
            row("Virat Kohli", "TCS", 1.0),
            row("Aamir Khan", "", 0.0),
            row("MS Dhoni", "Infosys", 2.0),
        ];

        let totals = total_per_client(&rows);
        assert_eq!(names(&totals), vec!["Virat Kohli", "Aamir Khan", "MS Dhoni"]);
    }

    #[test]
    fn test_stock_holders_case_insensitive() {
        let rows = vec![
            row("A", "Infosys", 10.0),
            row("B", "INFOSYS", 40.0),
            row("A", "infosys", 5.0),
            row("C", "TCS", 99.0),
        ];

        let holders = stock_holders(&rows, "Infosys").unwrap();
        assert_eq!(holders, vec![("B".to_string(), 40.0), ("A".to_string(), 15.0)]);
    }

    #[test]
    fn test_stock_holders_none_found() {
        let rows = vec![row("A", "TCS", 10.0)];
        let result = stock_holders(&rows, "NoSuchStock");
        assert!(matches!(result, Err(QueryError::NoMatchingData(s)) if s == "NoSuchStock"));
    }

    #[test]
    fn test_stock_holders_zero_value_is_not_missing() {
        let rows = vec![row("A", "TCS", 0.0)];
        let holders = stock_holders(&rows, "tcs").unwrap();
        assert_eq!(holders, vec![("A".to_string(), 0.0)]);
    }
}
