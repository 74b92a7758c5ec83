//! Shared constants for the inference core.

/// Feature columns used by the reference network-flow models.
/// Loaded models carry their own `features.json`; this list is only the
/// default layout written by the training pipeline.
pub const DEFAULT_FEATURES: &[&str] = &[
    "duration",
    "src_bytes",
    "dst_bytes",
    "count",
    "srv_count",
    "wrong_fragment",
];

/// Number of ranked features returned per row
pub const TOP_FEATURES: usize = 3;

/// Added to the batch standard deviation so constant columns don't divide by zero
pub const ZSCORE_EPSILON: f64 = 1e-6;

/// Default percentile for the batch-relative autoencoder threshold
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 95.0;

/// Exact Shapley enumeration visits 2^n coalitions per row
pub const MAX_SHAP_FEATURES: usize = 10;

// Artifact file names inside a model directory
pub const FEATURES_FILE: &str = "features.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const NATIVE_MODEL_FILE: &str = "model.json";
pub const ONNX_MODEL_FILE: &str = "model.onnx";
