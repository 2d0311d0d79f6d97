//! Reasoning oracle
//!
//! The oracle is an opaque natural-language engine: it takes a prompt plus
//! the merged table and returns free-form text. Nothing about its output is
//! trusted; see `fallback` for how answers are parsed.

use crate::error::QueryError;
use crate::models::MergedRow;
use crate::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

pub mod groq;
pub use groq::GroqClient;

/// Trait for oracle backends
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit the composed prompt and the table it should reason over
    async fn ask(&self, prompt: &str, table: &[MergedRow]) -> Result<String>;
}

/// Canned oracle behaviour for tests and offline development
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail(String),
    /// Reply only after sleeping; used to exercise timeouts
    Slow(Duration, String),
}

/// Oracle that plays back a fixed script and records what it was asked
pub struct ScriptedOracle {
    script: Script,
    prompts: Mutex<Vec<(String, usize)>>,
}

impl ScriptedOracle {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(Script::Reply(text.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(Script::Fail(message.into()))
    }

    /// `(prompt, table row count)` for every call so far
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.prompts
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn ask(&self, prompt: &str, table: &[MergedRow]) -> Result<String> {
        if let Ok(mut calls) = self.prompts.lock() {
            calls.push((prompt.to_string(), table.len()));
        }

        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(message) => Err(QueryError::OracleError(message.clone())),
            Script::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
        }
    }
}
