//! Groq chat-completions client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Groq by
//! default). Uses a long-lived reqwest::Client for connection pooling.

use crate::config::OracleConfig;
use crate::error::QueryError;
use crate::models::MergedRow;
use crate::oracle::ReasoningOracle;
use crate::tabular::render_csv;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Reusable oracle client (connection-pooled)
pub struct GroqClient {
    client: Client,
    config: OracleConfig,
}

impl GroqClient {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(config.timeout)
            .build()
            .map_err(|e| QueryError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ReasoningOracle for GroqClient {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn ask(&self, prompt: &str, table: &[MergedRow]) -> Result<String> {
        if self.config.api_key.is_empty() {
            return Err(QueryError::OracleError(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_table_context(table),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        };

        info!(model = %self.config.model, rows = table.len(), "Calling oracle");

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Oracle request failed: {}", e);
                QueryError::OracleError(format!("Oracle request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Oracle error response: {}", error_text);
            return Err(QueryError::OracleError(format!(
                "Oracle returned {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse oracle response: {}", e);
            QueryError::OracleError(format!("Oracle response was not valid JSON: {}", e))
        })?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::OracleError("No choices in oracle response".to_string()))?;

        info!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            chars = choice.message.content.len(),
            "Oracle response received"
        );

        Ok(choice.message.content)
    }
}

/// System message carrying the merged table as CSV
fn build_table_context(table: &[MergedRow]) -> String {
    let csv = render_csv(&MergedRow::COLUMNS, table.iter().map(|row| row.cells()));

    format!(
        "You are working with a table of wealth-portfolio data ({} rows). \
         Each row is one client joined with one of its transactions; clients \
         with no transactions have an empty stock_name and value 0.\n\n{}",
        table.len(),
        csv
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}
