//! Source readers
//!
//! The client registry and the transaction ledger each expose "fetch all
//! records". Both are traits so the pipeline can run against Postgres in
//! production and in-memory fixtures in tests.

use crate::error::QueryError;
use crate::models::{ClientRecord, RiskAppetite, TransactionRecord};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod postgres;
pub use postgres::{PgClientRegistry, PgTransactionLedger};

/// Document-oriented store of client profiles
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn fetch_clients(&self) -> Result<Vec<ClientRecord>>;

    async fn clients_by_risk(&self, risk: RiskAppetite) -> Result<Vec<ClientRecord>> {
        let clients = self.fetch_clients().await?;
        Ok(clients
            .into_iter()
            .filter(|c| c.risk_appetite == risk)
            .collect())
    }

    async fn clients_by_preference(&self, preference: &str) -> Result<Vec<ClientRecord>> {
        let clients = self.fetch_clients().await?;
        Ok(clients
            .into_iter()
            .filter(|c| c.investment_preferences.iter().any(|p| p == preference))
            .collect())
    }

    /// Replace every stored profile
    async fn replace_all(&self, clients: &[ClientRecord]) -> Result<()>;
}

/// Tabular, append-only transaction ledger
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>>;
}

/// In-memory client registry for development and tests
pub struct InMemoryClientRegistry {
    clients: Arc<RwLock<Vec<ClientRecord>>>,
    available: AtomicBool,
}

impl InMemoryClientRegistry {
    pub fn new(clients: Vec<ClientRecord>) -> Self {
        Self {
            clients: Arc::new(RwLock::new(clients)),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the registry going away
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for InMemoryClientRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn fetch_clients(&self) -> Result<Vec<ClientRecord>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(QueryError::SourceUnavailable(
                "client registry is unreachable".to_string(),
            ));
        }
        Ok(self.clients.read().await.clone())
    }

    async fn replace_all(&self, clients: &[ClientRecord]) -> Result<()> {
        let mut stored = self.clients.write().await;
        *stored = clients.to_vec();
        Ok(())
    }
}

/// In-memory ledger for development and tests
pub struct InMemoryTransactionLedger {
    transactions: Arc<RwLock<Vec<TransactionRecord>>>,
    available: AtomicBool,
}

impl InMemoryTransactionLedger {
    pub fn new(transactions: Vec<TransactionRecord>) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(transactions)),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn append(&self, transaction: TransactionRecord) {
        self.transactions.write().await.push(transaction);
    }
}

impl Default for InMemoryTransactionLedger {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl TransactionLedger for InMemoryTransactionLedger {
    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(QueryError::SourceUnavailable(
                "transaction ledger is unreachable".to_string(),
            ));
        }
        Ok(self.transactions.read().await.clone())
    }
}

/// The demo client book used by the `seed` binary
pub fn demo_clients() -> Vec<ClientRecord> {
    let raw: [(&str, RiskAppetite, &[&str], &str, &str); 12] = [
        ("Virat Kohli", RiskAppetite::High, &["Equity", "Real Estate", "Startups"], "Neha Shah", "Delhi"),
        ("Aamir Khan", RiskAppetite::Medium, &["Mutual Funds", "Bonds"], "Rajesh Mehta", "Mumbai"),
        ("MS Dhoni", RiskAppetite::High, &["Equity", "AgriTech", "Real Estate"], "Ravi Mehra", "Ranchi"),
        ("Alia Bhatt", RiskAppetite::Medium, &["ESG Funds", "Startups"], "Sneha Kapoor", "Mumbai"),
        ("Rohit Sharma", RiskAppetite::High, &["Crypto", "Equity"], "Ankit Verma", "Nagpur"),
        ("Deepika Padukone", RiskAppetite::Low, &["PPF", "Real Estate"], "Sneha Kapoor", "Bangalore"),
        ("PV Sindhu", RiskAppetite::Medium, &["Private Equity", "Equity"], "Ankit Verma", "Hyderabad"),
        ("Sachin Tendulkar", RiskAppetite::Low, &["Government Bonds", "FD"], "Ravi Mehra", "Mumbai"),
        ("Ranveer Singh", RiskAppetite::Medium, &["REITs", "Mutual Funds"], "Sneha Kapoor", "Mumbai"),
        ("Hrithik Roshan", RiskAppetite::Medium, &["Balanced Funds", "Real Estate"], "Sneha Kapoor", "Mumbai"),
        ("KL Rahul", RiskAppetite::High, &["Equity", "Crypto"], "Neha Shah", "Bangalore"),
        ("Rishabh Pant", RiskAppetite::Medium, &["Startups", "Index Funds"], "Rajesh Mehta", "Delhi"),
    ];

    raw.iter()
        .map(|(name, risk, prefs, rm, address)| ClientRecord {
            client_name: name.to_string(),
            risk_appetite: *risk,
            investment_preferences: prefs.iter().map(|p| p.to_string()).collect(),
            relationship_manager: rm.to_string(),
            address: address.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_registry_errors() {
        let registry = InMemoryClientRegistry::new(demo_clients());
        registry.set_available(false);

        let result = registry.fetch_clients().await;
        assert!(matches!(result, Err(QueryError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_clients_by_risk() {
        let registry = InMemoryClientRegistry::new(demo_clients());
        let low = registry.clients_by_risk(RiskAppetite::Low).await.unwrap();

        let names: Vec<_> = low.iter().map(|c| c.client_name.as_str()).collect();
        assert_eq!(names, vec!["Deepika Padukone", "Sachin Tendulkar"]);
    }

    #[tokio::test]
    async fn test_clients_by_preference_is_exact() {
        let registry = InMemoryClientRegistry::new(demo_clients());

        let crypto = registry.clients_by_preference("Crypto").await.unwrap();
        assert_eq!(crypto.len(), 2);

        let partial = registry.clients_by_preference("Crypt").await.unwrap();
        assert!(partial.is_empty());
    }

    #[tokio::test]
    async fn test_replace_all() {
        let registry = InMemoryClientRegistry::default();
        registry.replace_all(&demo_clients()).await.unwrap();
        assert_eq!(registry.fetch_clients().await.unwrap().len(), 12);
    }
}
