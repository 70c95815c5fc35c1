use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod assets;
mod catalog;
mod config;
mod error;
mod history;
mod ollama;
mod profiles;
mod service;
mod tools;

use crate::catalog::Catalog;
use crate::config::ServiceConfig;
use crate::ollama::{ChatModel, OllamaClient};
use crate::service::AssistantService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting shopping assistant service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = ServiceConfig::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        data_dir = %config.storage.data_dir.display(),
        product_type = %config.shop.product_type,
        "Configuration loaded"
    );

    // Ensure data directory exists
    std::fs::create_dir_all(&config.storage.data_dir)?;

    let metrics = PrometheusBuilder::new().install_recorder()?;

    // The catalog is read once; a broken catalog leaves the service up with tools reporting the error
    let catalog = Arc::new(Catalog::load_or_unavailable(&config.catalog_path()));

    let ollama = OllamaClient::new(config.ollama.clone())?;
    if ollama.health_check().await {
        info!(url = %config.ollama.base_url, model = %config.ollama.model, "Ollama is available");
    } else {
        warn!(url = %config.ollama.base_url, "Ollama is not available");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let service = Arc::new(AssistantService::new(config, catalog, ollama));

    // Make sure the log exists with its seed before the first request
    let history_len = service.history().len();
    info!(entries = history_len, "Conversation history ready");

    let app = api::router(service, Some(metrics));

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("concierge_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
