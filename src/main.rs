use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use expense_rules::api::{cors_layer, create_router, AppState};
use expense_rules::config::Config;
use expense_rules::observability::init_tracing;
use expense_rules::storage::{MemoryStorage, PostgresStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting expense rules service"
    );

    // Connect storage
    let storage = connect_storage(&config).await?;

    // Create application state
    let state = Arc::new(AppState::new(storage.clone()));

    // Create router
    let app = create_router(state, cors_layer(&config.cors_origins)?);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    let served = if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    } else {
        axum::serve(listener, app).await
    };

    // Cleanup
    info!("Shutting down...");
    storage.close().await;

    served?;
    info!("Shutdown complete");
    Ok(())
}

async fn connect_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let Some(url) = config.database_url.as_deref().filter(|_| config.uses_database()) else {
        info!("No database configured, using in-memory storage");
        return Ok(Arc::new(MemoryStorage::new()));
    };

    let storage =
        PostgresStorage::connect(url, config.db_min_connections, config.db_max_connections)
            .await?;
    info!(
        max_connections = config.db_max_connections,
        "Connected to PostgreSQL"
    );

    if config.run_migrations {
        storage.run_migrations().await?;
        info!("Database migrations applied");
    }

    Ok(Arc::new(storage))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
