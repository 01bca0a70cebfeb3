//! station-api - JSON:API service for the station music library
//!
//! Serves albums, labels, reviews and playlists from a read-only library
//! database, with offset and cursor pagination and federated search.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use station_api::{build_router, AppState, SqliteStore};
use station_common::api::KeyTable;
use station_common::config::ServiceConfig;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for station-api
#[derive(Parser, Debug)]
#[command(name = "station-api")]
#[command(about = "JSON:API service for the station music library")]
#[command(version)]
struct Args {
    /// Configuration file (overrides STATION_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long, env = "STATION_PORT")]
    port: Option<u16>,

    /// Library database (overrides the configuration file)
    #[arg(short, long, env = "STATION_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting station-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = ServiceConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    info!("Database path: {}", config.database.path.display());
    let store = match SqliteStore::connect_readonly(&config.database.path).await {
        Ok(store) => {
            info!("✓ Connected to library database (read-only)");
            store
        }
        Err(e) => {
            error!("Failed to connect to library database: {}", e);
            return Err(e.into());
        }
    };

    let keys = KeyTable::new(config.api_keys.clone());
    if keys.is_empty() {
        warn!("No API keys configured; federated search and artwork are unavailable");
    } else {
        info!("Loaded {} API key(s)", keys.len());
    }

    let state = AppState::new(Arc::new(store), config.api.clone(), keys);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("station-api listening on http://{}", addr);
    info!(
        "Health check: http://{}{}/health",
        addr,
        config.api.base_path.trim_end_matches('/')
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
