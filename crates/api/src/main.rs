use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imgbatch_api::config::ServerConfig;
use imgbatch_api::router::build_app_router;
use imgbatch_api::state::AppState;
use imgbatch_core::registry::JobRegistry;
use imgbatch_pipeline::{BatchEngine, HttpFetcher};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "imgbatch_api=debug,imgbatch_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    config
        .pipeline
        .ensure_dirs()
        .await
        .expect("Failed to create output directories");
    tracing::info!(
        uploads = %config.upload_dir.display(),
        images = %config.pipeline.images_dir.display(),
        tables = %config.pipeline.tables_dir.display(),
        "Storage directories ready",
    );

    // --- Batch engine ---
    let fetcher = HttpFetcher::new(Duration::from_secs(config.pipeline.fetch_timeout_secs))
        .expect("Failed to build HTTP client");
    let registry = Arc::new(JobRegistry::new());
    let engine = BatchEngine::new(&config.pipeline, registry, Arc::new(fetcher));
    tracing::info!(
        target_width = config.pipeline.target_width,
        jpeg_quality = config.pipeline.jpeg_quality,
        image_concurrency = ?config.pipeline.image_concurrency,
        "Batch engine started",
    );

    // --- App state + router ---
    let state = AppState::new(config.clone(), engine);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). Jobs still in
/// flight are abandoned with the process.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
