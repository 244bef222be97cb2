use anyhow::Context;
use paystack_checkout::api::{self, AppState};
use paystack_checkout::checkout::ReturnHandler;
use paystack_checkout::config::Config;
use paystack_checkout::database::{self, PgStore, PoolConfig};
use paystack_checkout::payments::Paystack;
use paystack_checkout::telemetry;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    telemetry::init_tracing()?;

    let config = Config::from_env()?;

    tracing::info!("Starting Paystack checkout");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Storefront: {}", config.site.ecommerce_url);
    tracing::info!("Paystack endpoint: {}", config.site.paystack.base_url);

    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await
    .context("Failed to connect to the database")?;
    database::health_check(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let processor = Arc::new(Paystack::new(config.site.clone(), store.clone())?);
    let handler = ReturnHandler::new(store, processor, config.site.clone());

    let app = api::router(AppState::new(handler, config.server.environment.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server host")?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
