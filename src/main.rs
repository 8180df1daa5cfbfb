mod config;
mod game;
mod lobby;
mod metrics;
mod net;
mod util;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::lobby::manager::RoomManager;
use crate::metrics::Metrics;
use crate::net::transport::WebSocketServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Log level comes from RUST_LOG, default info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    info!("Tank Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    info!(
        "Configuration loaded: {}:{}, max_rooms={}, reconnect_timeout={}ms",
        config.bind_address, config.port, config.max_rooms, config.reconnect_timeout_ms
    );

    let metrics = Arc::new(Metrics::new());

    // Health/metrics endpoint on its own port
    let health_metrics = metrics.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_health_server(health_metrics, health_port).await {
            error!("Health server error: {e}");
        }
    });

    let manager = Arc::new(RwLock::new(RoomManager::new(config.clone(), metrics.clone())));
    let server = WebSocketServer::new(config, manager, metrics);

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {e}");
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Server stopped");
    Ok(())
}
