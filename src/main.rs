use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config_service::config::{self, FileConfig};
use config_service::database::DatabaseManager;
use config_service::server;

#[derive(Debug, Parser)]
#[command(name = "config-service", version, about = "Multi-tenant configuration document service")]
struct Args {
    /// Port to listen on, overriding CONFIG_SERVICE_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// YAML or JSON config file, overriding CONFIG_PATH
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("config_service=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = config::config().clone();
    if let Some(path) = args.config {
        config = config.with_file(FileConfig::load(&path)?);
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    tracing::info!("Starting config-service in {:?} mode", config.environment);

    let store = DatabaseManager::connect_store(&config.database)
        .await
        .context("failed to connect the document store")?;
    let port = config.api.port;
    let app = server::app(store, config).await?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("config-service listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    DatabaseManager::close_all().await;
    Ok(())
}
