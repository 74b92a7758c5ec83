//! Prediction request/response types

use netflow_detector_core::PredictionResult;
use serde::{Deserialize, Serialize};

/// `?model=<id>`; the configured default model when absent
#[derive(Debug, Default, Deserialize)]
pub struct ModelQuery {
    pub model: Option<String>,
}

/// `/predict` and `/predict_file` response
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub model: String,
    pub results: Vec<PredictionResult>,
}

/// `/predict_single` response; `results` holds one object, not a list
#[derive(Debug, Serialize, Deserialize)]
pub struct SinglePredictResponse {
    pub model: String,
    pub results: PredictionResult,
}
