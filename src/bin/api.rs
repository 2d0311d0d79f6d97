use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wealth_query_router::{
    api::{start_server, ApiState},
    config::AppConfig,
    fallback::FallbackAdapter,
    history::HistoryStore,
    oracle::GroqClient,
    pipeline::QueryPipeline,
    sources::{
        demo_clients, postgres::lazy_pool, ClientRegistry, InMemoryClientRegistry,
        InMemoryTransactionLedger, PgClientRegistry, PgTransactionLedger, TransactionLedger,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("🚀 Wealth Query Router - API Server");
    info!("📍 Port: {}", config.port);
    info!("🧠 Oracle model: {}", config.oracle.model);

    let (registry, ledger, history): (
        Arc<dyn ClientRegistry>,
        Arc<dyn TransactionLedger>,
        HistoryStore,
    ) = match &config.storage.database_url {
        Some(url) => {
            let pool = lazy_pool(url)?;
            info!("🗄️  Storage: postgres");
            (
                Arc::new(PgClientRegistry::new(pool.clone())),
                Arc::new(PgTransactionLedger::new(pool.clone())),
                HistoryStore::postgres(pool),
            )
        }
        None => {
            warn!("DATABASE_URL not set; serving demo clients from memory");
            (
                Arc::new(InMemoryClientRegistry::new(demo_clients())),
                Arc::new(InMemoryTransactionLedger::default()),
                HistoryStore::in_memory(),
            )
        }
    };

    let timeout = config.oracle.timeout;
    let oracle = Arc::new(GroqClient::new(config.oracle)?);
    let fallback = FallbackAdapter::new(oracle, timeout);
    let pipeline = Arc::new(QueryPipeline::new(registry.clone(), ledger.clone(), fallback));

    info!("✅ Pipeline initialized");
    info!("📡 Starting API server...");

    let state = ApiState {
        pipeline,
        registry,
        ledger,
        history: Arc::new(history),
    };

    start_server(state, config.port).await?;

    Ok(())
}
