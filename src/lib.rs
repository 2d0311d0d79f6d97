//! Wealth Query Router
//!
//! Answers natural-language questions about client portfolios:
//! - Merges the client registry with the transaction ledger on every query
//! - Routes recognised question shapes to deterministic aggregations
//! - Falls back to a reasoning oracle for everything else
//! - Normalizes every answer into a text + graph + table envelope
//!
//! FLOW:
//! QUESTION → MERGE → CLASSIFY → FAST PATH | ORACLE → NORMALIZE

pub mod aggregations;
pub mod api;
pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fallback;
pub mod history;
pub mod merger;
pub mod models;
pub mod normalizer;
pub mod oracle;
pub mod pipeline;
pub mod sources;
pub mod tabular;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use classifier::{QueryClassifier, QueryKind};
pub use pipeline::QueryPipeline;
