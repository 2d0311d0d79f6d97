//! Error types for the wealth query router

use std::time::Duration;
use thiserror::Error;

/// Result type alias for query pipeline operations
pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {

    // =============================
    // Query Pipeline Errors
    // =============================

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Oracle call timed out after {0:?}")]
    OracleTimeout(Duration),

    /// Recovered locally: the answer degrades to raw oracle text.
    #[error("Malformed oracle output: {0}")]
    MalformedOracleOutput(String),

    /// Recovered locally: the answer becomes a "no holdings found" envelope.
    #[error("No matching data: {0}")]
    NoMatchingData(String),

    // =============================
    // Plumbing Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Query not found at index {0}")]
    HistoryNotFound(usize),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
