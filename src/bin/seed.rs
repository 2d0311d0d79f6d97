use tracing::info;
use wealth_query_router::{
    config::StorageConfig,
    sources::{demo_clients, postgres::lazy_pool, ClientRegistry, PgClientRegistry},
};

/// Replace the client registry contents with the demo client set
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let Some(url) = StorageConfig::from_env().database_url else {
        eprintln!("⚠️  DATABASE_URL not set; nothing to seed");
        std::process::exit(1);
    };

    let registry = PgClientRegistry::new(lazy_pool(&url)?);
    let clients = demo_clients();
    registry.replace_all(&clients).await?;

    info!("✅ Seeded {} client profiles", clients.len());

    Ok(())
}
