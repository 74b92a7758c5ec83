//! Network-flow anomaly detection HTTP server
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   DETECTOR SERVER                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────────────────────────────┐   │
//! │  │  Router   │──►│  PredictionService                │   │
//! │  │  (Axum)   │   │  align ► scale ► predict ► explain│   │
//! │  └───────────┘   └─────────────────┬─────────────────┘   │
//! │                                    ▼                     │
//! │                       ┌──────────────────────┐           │
//! │                       │ ModelRegistry (r/o)  │           │
//! │                       └──────────────────────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use netflow_detector_core::PredictionService;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::{AppError, AppResult};

use models::ModelQuery;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub config: Config,
}

impl AppState {
    pub fn new(service: PredictionService, config: Config) -> Self {
        Self { service, config }
    }

    /// Model named in the query, or the configured default
    pub fn model_or_default(&self, query: ModelQuery) -> String {
        query.model.unwrap_or_else(|| self.config.default_model.clone())
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/models", get(handlers::health::models))
        .route("/predict", post(handlers::predict::predict))
        .route("/predict_single", post(handlers::predict::predict_single))
        .route("/predict_file", post(handlers::predict::predict_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
