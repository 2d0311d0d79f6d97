//! Query pipeline
//!
//! QUESTION → FETCH + MERGE → CLASSIFY → FAST PATH | ORACLE → ENVELOPE
//!
//! Every call does its own fetch and merge; nothing is cached between
//! questions. `run_query` always returns a well-formed `QueryResult`.

use crate::aggregations;
use crate::classifier::{QueryClassifier, QueryKind};
use crate::error::QueryError;
use crate::fallback::FallbackAdapter;
use crate::merger::merge_dataset;
use crate::models::{MergedRow, QueryResult};
use crate::normalizer::render_dict;
use crate::sources::{ClientRegistry, TransactionLedger};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct QueryPipeline {
    registry: Arc<dyn ClientRegistry>,
    ledger: Arc<dyn TransactionLedger>,
    fallback: FallbackAdapter,
}

impl QueryPipeline {
    pub fn new(
        registry: Arc<dyn ClientRegistry>,
        ledger: Arc<dyn TransactionLedger>,
        fallback: FallbackAdapter,
    ) -> Self {
        Self {
            registry,
            ledger,
            fallback,
        }
    }

    /// Answer one question. Errors never escape; they become an error
    /// envelope.
    pub async fn run_query(&self, question: &str) -> QueryResult {
        let start = Instant::now();

        let result = match self.answer(question).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Query failed: {}", e);
                QueryResult::error(e)
            }
        };

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            entries = result.graph.len(),
            "Query answered"
        );

        result
    }

    async fn answer(&self, question: &str) -> Result<QueryResult> {
        let table = merge_dataset(self.registry.as_ref(), self.ledger.as_ref()).await?;

        let classification = QueryClassifier::classify(question);
        info!(kind = ?classification.kind, "Question classified");

        match classification.kind {
            QueryKind::Generic => Ok(self.fallback.run(question, &table).await),
            fast_path => Ok(run_fast_path(&fast_path, &table)),
        }
    }
}

/// Execute a deterministic fast path against the merged table
pub fn run_fast_path(kind: &QueryKind, table: &[MergedRow]) -> QueryResult {
    match kind {
        QueryKind::TopFivePortfolios => {
            let ranking = aggregations::top_five_portfolios(table);
            QueryResult::normalize(
                format!(
                    "The top five portfolios (by total investment value) are: {}",
                    render_dict(&ranking)
                ),
                &ranking,
            )
        }
        QueryKind::TotalPerClient => {
            let ranking = aggregations::total_per_client(table);
            QueryResult::normalize(
                format!("Total investments per client:\n{}", render_dict(&ranking)),
                &ranking,
            )
        }
        QueryKind::StockHolders { stock } => match aggregations::stock_holders(table, stock) {
            Ok(ranking) => QueryResult::normalize(
                format!("Highest holders of {}:\n{}", stock, render_dict(&ranking)),
                &ranking,
            ),
            Err(QueryError::NoMatchingData(_)) => QueryResult::no_holdings(stock),
            Err(e) => QueryResult::error(e),
        },
        QueryKind::Generic => QueryResult::error("no fast path for a generic question"),
    }
}
