//! Runtime configuration
//!
//! Everything is read from the environment (after `dotenv`) once at startup
//! and handed to components explicitly. Nothing here is global.

use std::env;
use std::time::Duration;
use tracing::warn;

use crate::error::QueryError;
use crate::Result;

const DEFAULT_ORACLE_MODEL: &str = "llama3-8b-8192";
const DEFAULT_ORACLE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 8000;

/// Credentials and model selection for the reasoning oracle
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl OracleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            base_url: DEFAULT_ORACLE_URL.to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GROQ_API_KEY")
            .or_else(|_| env::var("ORACLE_API_KEY"))
            .unwrap_or_default();

        if api_key.is_empty() {
            warn!("GROQ_API_KEY not set; generic questions will return an error envelope");
        }

        let mut config = Self::new(api_key);

        if let Ok(model) = env::var("ORACLE_MODEL") {
            config.model = model;
        }
        if let Ok(url) = env::var("ORACLE_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(secs) = env::var("ORACLE_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                QueryError::ConfigError(format!("ORACLE_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Where the client registry, ledger and query history live
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// `None` selects the in-memory backends
    pub database_url: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("POSTGRES_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self { database_url }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(raw) => raw
                .parse()
                .map_err(|_| QueryError::ConfigError(format!("PORT is not a valid port: {}", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            oracle: OracleConfig::from_env()?,
            storage: StorageConfig::from_env(),
            port,
        })
    }
}
