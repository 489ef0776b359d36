mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use chatty_db::Database;
use chatty_gateway::Gateway;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatty=debug,chatty_gateway=debug,chatty_db=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Chatty server listening on {}", addr);

    Gateway::new(Arc::new(db), config.gateway).run(listener).await;

    Ok(())
}
