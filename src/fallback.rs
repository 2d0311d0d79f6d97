//! Reasoning fallback adapter
//!
//! Questions with no fast path go to the oracle together with a fixed
//! business instruction and the merged table. The reply is untrusted text:
//! `parse_oracle_output` either recovers a name → value mapping from it or
//! degrades to returning the text verbatim. Neither path raises.

use crate::error::QueryError;
use crate::models::{MergedRow, QueryResult};
use crate::normalizer::render_listing;
use crate::oracle::ReasoningOracle;
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Business vocabulary and output contract sent ahead of every question
pub const GENERAL_INSTRUCTION: &str = "\
You are a professional wealth-portfolio data analyst. \
Answer the business question using only the table provided. \
Group, filter, sum and sort the rows as needed. \
For questions about top portfolios, group by client_name and sum value. \
For a breakup per relationship manager, group by relationship manager and sum value. \
For top relationship managers, rank them by the total portfolio value they handle. \
For the highest holders of a specific stock, filter by stock_name and sort by value, largest first. \
One crore is 10,000,000. \
Reply with ONLY a single flat JSON object whose keys are client or entity names \
and whose values are numeric portfolio values. \
For stock-specific questions put the stock in the key, for example \
{\"Virat Kohli - Infosys\": 23000000.00, \"KL Rahul - Infosys\": 15000000.00}. \
Do not add explanations, comments or any text outside the JSON object.";

/// What the oracle's reply turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum OracleAnswer {
    /// Ordered entity → value pairs recovered from the reply
    Mapping(Vec<(String, f64)>),
    /// Nothing usable; the reply text as-is
    RawText(String),
}

impl OracleAnswer {
    pub fn into_result(self) -> QueryResult {
        match self {
            OracleAnswer::Mapping(entries) => QueryResult::normalize(
                format!("Here is your result:\n{}", render_listing(&entries)),
                &entries,
            ),
            OracleAnswer::RawText(text) => QueryResult::raw_text(text),
        }
    }
}

pub struct FallbackAdapter {
    oracle: Arc<dyn ReasoningOracle>,
    timeout: Duration,
}

impl FallbackAdapter {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn compose_prompt(question: &str) -> String {
        format!("{}\n\nQuestion: {}", GENERAL_INSTRUCTION, question)
    }

    /// Ask the oracle, bounded by the configured timeout. A timeout is a
    /// failed call; nothing is retried here.
    pub async fn ask(&self, question: &str, table: &[MergedRow]) -> Result<String> {
        let prompt = Self::compose_prompt(question);

        match tokio::time::timeout(self.timeout, self.oracle.ask(&prompt, table)).await {
            Ok(reply) => reply,
            Err(_) => Err(QueryError::OracleTimeout(self.timeout)),
        }
    }

    /// Full fallback path. Oracle failures become an error envelope.
    pub async fn run(&self, question: &str, table: &[MergedRow]) -> QueryResult {
        info!(oracle = self.oracle.name(), "Routing question to oracle");

        match self.ask(question, table).await {
            Ok(raw) => {
                debug!(raw = %raw, "Raw oracle reply");
                parse_oracle_output(&raw).into_result()
            }
            Err(e) => {
                warn!("Oracle call failed: {}", e);
                QueryResult::error(e)
            }
        }
    }
}

/// Parse-or-degrade. Never fails: anything that is not a usable mapping
/// comes back as `RawText` with the original reply.
pub fn parse_oracle_output(raw: &str) -> OracleAnswer {
    match parse_mapping(raw) {
        Ok(entries) => OracleAnswer::Mapping(entries),
        Err(e) => {
            debug!("Degrading to raw oracle text: {}", e);
            OracleAnswer::RawText(raw.to_string())
        }
    }
}

fn parse_mapping(raw: &str) -> Result<Vec<(String, f64)>> {
    let span = extract_object_span(raw).ok_or_else(|| {
        QueryError::MalformedOracleOutput("no brace-delimited object".to_string())
    })?;

    let parsed: Value = serde_json::from_str(span)
        .map_err(|e| QueryError::MalformedOracleOutput(format!("invalid JSON: {}", e)))?;

    let Value::Object(object) = parsed else {
        return Err(QueryError::MalformedOracleOutput(
            "top-level value is not an object".to_string(),
        ));
    };

    match columns_to_mapping(&object) {
        Some(zipped) => zipped,
        None => flat_mapping(&object),
    }
}

/// Span from the first `{` to the last `}` of the reply, across newlines
pub fn extract_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn flat_mapping(object: &Map<String, Value>) -> Result<Vec<(String, f64)>> {
    object
        .iter()
        .map(|(name, value)| {
            numeric(value)
                .map(|v| (name.clone(), v))
                .ok_or_else(|| {
                    QueryError::MalformedOracleOutput(format!("non-numeric value for '{}'", name))
                })
        })
        .collect()
}

/// Compatibility shim for one observed oracle shape: a column-oriented
/// object such as `{"client_name": ["A", "B"], "value": [1, 2]}`.
///
/// Returns `None` when the object does not have that shape. Columns are
/// zipped pairwise; a repeated name keeps its first position and last value.
pub fn columns_to_mapping(object: &Map<String, Value>) -> Option<Result<Vec<(String, f64)>>> {
    let names = object.get("client_name")?.as_array()?;
    let values = object.get("value")?.as_array()?;

    let mut entries: Vec<(String, f64)> = Vec::with_capacity(names.len().min(values.len()));

    for (name, value) in names.iter().zip(values) {
        let name = match name {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Some(Err(QueryError::MalformedOracleOutput(
                    "client_name column holds a non-scalar".to_string(),
                )))
            }
        };
        let Some(value) = numeric(value) else {
            return Some(Err(QueryError::MalformedOracleOutput(format!(
                "value column holds a non-numeric entry for '{}'",
                name
            ))));
        };

        match entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => entries.push((name, value)),
        }
    }

    Some(Ok(entries))
}

/// Numbers, or text that parses as a finite number
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
