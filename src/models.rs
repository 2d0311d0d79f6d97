//! Core data models for the wealth query router

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum RiskAppetite {
    Low,
    Medium,
    High,
}

impl RiskAppetite {
    /// Case-insensitive parse (`"high"`, `"HIGH"` → `High`)
    pub fn parse(level: &str) -> Option<Self> {
        match level.trim().to_lowercase().as_str() {
            "low" => Some(RiskAppetite::Low),
            "medium" => Some(RiskAppetite::Medium),
            "high" => Some(RiskAppetite::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskAppetite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskAppetite::Low => "Low",
            RiskAppetite::Medium => "Medium",
            RiskAppetite::High => "High",
        };
        write!(f, "{}", s)
    }
}

// Registry documents are hand-edited; accept any casing
impl<'de> Deserialize<'de> for RiskAppetite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RiskAppetite::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown risk appetite '{}'", raw))
        })
    }
}

//
// ================= Source Records =================
//

/// A client profile as held by the document-oriented client registry.
/// Only `client_name` and `risk_appetite` are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientRecord {
    pub client_name: String,
    pub risk_appetite: RiskAppetite,
    #[serde(default)]
    pub investment_preferences: Vec<String>,
    #[serde(default)]
    pub relationship_manager: String,
    #[serde(default)]
    pub address: String,
}

/// A ledger row. `value` keeps whatever the ledger handed over (number,
/// numeric text, garbage, null); the merger owns numeric coercion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub client_name: String,
    pub stock_name: String,
    pub value: serde_json::Value,
    pub transaction_date: Option<String>,
    pub relationship_manager: String,
}

//
// ================= Merged Table =================
//

/// One row of the analytic table: a client joined with one of its
/// transactions, or with blanks when it has none.
///
/// Every field is scalar; list-valued fields are already flattened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedRow {
    pub client_name: String,
    pub risk_appetite: String,
    pub investment_preferences: String,
    pub client_relationship_manager: String,
    pub address: String,
    pub stock_name: String,
    pub value: f64,
    pub transaction_date: String,
    pub transaction_relationship_manager: String,
}

impl MergedRow {
    pub const COLUMNS: [&'static str; 9] = [
        "client_name",
        "risk_appetite",
        "investment_preferences",
        "relationship_manager_client",
        "address",
        "stock_name",
        "value",
        "transaction_date",
        "relationship_manager_transaction",
    ];

    /// Cells in `COLUMNS` order
    pub fn cells(&self) -> [String; 9] {
        [
            self.client_name.clone(),
            self.risk_appetite.clone(),
            self.investment_preferences.clone(),
            self.client_relationship_manager.clone(),
            self.address.clone(),
            self.stock_name.clone(),
            self.value.to_string(),
            self.transaction_date.clone(),
            self.transaction_relationship_manager.clone(),
        ]
    }
}

//
// ================= Query Result Envelope =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub client: String,
    pub portfolio_value: f64,
}

/// The canonical answer shape. `graph` and `table` are always present,
/// possibly empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub text: String,
    pub graph: Vec<GraphPoint>,
    pub table: Vec<TableRow>,
}

//
// ================= Query History =================
//

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryHistoryEntry {
    #[serde(skip_serializing)]
    pub id: Uuid,
    pub text: String,
    /// Display timestamp, e.g. `16-Oct 02:05 PM`
    pub time: String,
    #[serde(skip_serializing)]
    pub recorded_at: DateTime<Utc>,
}

//
// ================= Dashboard =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyTotal {
    pub month: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetShare {
    pub asset: String,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagerLoad {
    pub rm: String,
    pub clients: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardMetrics {
    pub top_portfolios: u64,
    pub total_aum: String,
    pub active_rms: u64,
    pub high_risk: u64,
    pub portfolio_growth: Vec<MonthlyTotal>,
    pub asset_allocation: Vec<AssetShare>,
    pub rm_clients: Vec<ManagerLoad>,
}
