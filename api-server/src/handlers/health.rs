//! Health and model status handlers

use axum::{extract::State, Json};

use crate::models::{HealthResponse, ModelsResponse};
use crate::AppState;

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        available_models: state.service.available_models(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// Metadata for every loaded model
pub async fn models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state
        .service
        .registry()
        .models()
        .map(|model| model.metadata().clone())
        .collect();

    Json(ModelsResponse {
        default_model: state.config.default_model.clone(),
        models,
    })
}
