//! E-Paper Server
//!
//! Serves dated newspaper PDFs from a local directory with a cached
//! catalog, downloads and generated thumbnails.

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epaper_server::config::Config;
use epaper_server::routes;
use epaper_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "epaper_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting E-Paper Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("PDF directory: {}", config.library.pdf_dir.display());
    tracing::info!("Thumbnail directory: {}", config.thumbnails.dir.display());

    tokio::fs::create_dir_all(&config.thumbnails.dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create thumbnail directory {}",
                config.thumbnails.dir.display()
            )
        })?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config);

    // Initial catalog scan
    let snapshot = state.service().catalog().get_catalog().await;
    if snapshot.built_at.is_none() {
        tracing::warn!("Initial catalog scan failed, will retry on the next request");
    } else {
        tracing::info!("Catalog initialized with {} PDFs", snapshot.len());
        for record in &snapshot.documents {
            tracing::info!("  {} -> {} ({})", record.filename, record.title, record.id);
        }
    }

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("E-Paper Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
