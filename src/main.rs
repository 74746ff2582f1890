use listing_lens::{build_router, AppState, Config, LlmClient};

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    info!(
        "Starting Listing Lens service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            info!("  +------ LLM provider: {}", config.llm_provider);
            info!("  +------- LLM API URL: {}", config.llm_api_url);
            info!("  +--------- LLM model: {}", config.llm_model_name);
            info!("  +-------- Max images: {}", config.max_images);
            info!("  +- Request timeout s: {}", config.request_timeout_seconds);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let gateway = match LlmClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create model gateway: {}", e);
            std::process::exit(1);
        }
    };

    // Build the application router
    let app = build_router(AppState::new(&config, Arc::new(gateway)));

    // Parse server address
    let addr = match SocketAddr::from_str(&config.server_address()) {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server address {}: {}", config.server_address(), e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server bound to {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Start server with graceful shutdown
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Listing Lens service stopped");
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_lens=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
