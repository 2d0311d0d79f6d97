//! Response Normalizer
//!
//! The only place a `QueryResult` is built. Fast paths, structured oracle
//! answers, raw oracle text, the no-holdings case and errors all go through
//! one of these constructors.

use crate::models::{GraphPoint, QueryResult, TableRow};

impl QueryResult {
    /// Envelope for an ordered name → value mapping. `graph` and `table`
    /// carry one entry per mapping entry, in mapping order.
    pub fn normalize(text: String, entries: &[(String, f64)]) -> Self {
        let graph = entries
            .iter()
            .map(|(label, value)| GraphPoint {
                label: label.clone(),
                value: *value,
            })
            .collect();

        let table = entries
            .iter()
            .map(|(client, value)| TableRow {
                client: client.clone(),
                portfolio_value: *value,
            })
            .collect();

        Self { text, graph, table }
    }

    /// Narrative only; used for unparseable oracle output
    pub fn raw_text(text: impl Into<String>) -> Self {
        Self::normalize(text.into(), &[])
    }

    /// Nobody holds the requested stock. Distinct from a zero-valued result.
    pub fn no_holdings(stock: &str) -> Self {
        Self::raw_text(format!("No holdings found for stock '{}'.", stock))
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::raw_text(format!("Error: {}", message))
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty() && self.table.is_empty()
    }
}

/// Literal-dict rendering used in fast-path narratives:
/// `{'Alice': 100.0, 'Bob': 50.0}`
pub fn render_dict(entries: &[(String, f64)]) -> String {
    let body: Vec<String> = entries
        .iter()
        .map(|(name, value)| format!("'{}': {:?}", name.replace('\'', "\\'"), value))
        .collect();
    format!("{{{}}}", body.join(", "))
}

/// One `name: value` line per entry
pub fn render_listing(entries: &[(String, f64)]) -> String {
    entries
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}
