//! Network-flow anomaly detection server
//!
//! Loads the configured models once, then serves predictions over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use netflow_detector_core::{ModelRegistry, PredictionService};
use netflow_detector_server::{config::LogFormat, create_router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize logging
    init_tracing(config.log_format);

    tracing::info!("Detector server starting...");
    tracing::info!("Models directory: {}", config.models_dir.display());

    // Load models
    let registry = ModelRegistry::load(&config.models_dir, &config.models, &config.model_options());
    let service = PredictionService::new(Arc::new(registry));
    tracing::info!("Available models: {:?}", service.available_models());

    if !service.registry().contains(&config.default_model) {
        tracing::warn!("Default model '{}' is not loaded", config.default_model);
    }

    // Build application state
    let state = AppState::new(service, config.clone());

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "netflow_detector_server=debug,netflow_detector_core=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
