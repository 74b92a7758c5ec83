//! Status response types

use netflow_detector_core::ModelMetadata;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub available_models: Vec<String>,
    pub version: &'static str,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub models: Vec<ModelMetadata>,
}
