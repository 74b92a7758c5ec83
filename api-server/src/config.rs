//! Configuration module

use std::env;
use std::path::PathBuf;

use netflow_detector_core::{ExplainPreference, ModelKind, ModelOptions, ModelSpec, ThresholdPolicy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Directory holding one sub-directory of artifacts per model
    pub models_dir: PathBuf,

    /// Models to load at startup
    pub models: Vec<ModelSpec>,

    /// Model used when a request has no `model` query parameter
    pub default_model: String,

    /// Autoencoder threshold policy
    pub threshold: ThresholdPolicy,

    /// Preferred explanation method
    pub explain: ExplainPreference,

    /// ONNX Runtime intra-op threads per session
    pub onnx_threads: usize,

    /// Upload size limit in megabytes
    pub max_upload_mb: usize,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            models_dir: PathBuf::from("models"),
            models: vec![
                ModelSpec::new("isolation_forest", ModelKind::IsolationForest),
                ModelSpec::new("autoencoder", ModelKind::Autoencoder),
            ],
            default_model: "autoencoder".to_string(),
            threshold: ThresholdPolicy::default(),
            explain: ExplainPreference::Auto,
            onnx_threads: 1,
            max_upload_mb: 16,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let models = match env::var("MODELS") {
            Ok(list) => ModelSpec::parse_list(&list).map_err(|reason| ConfigError::Invalid {
                name: "MODELS",
                reason,
            })?,
            Err(_) => defaults.models,
        };

        let threshold = match env::var("AUTOENCODER_THRESHOLD") {
            Ok(value) => value.parse::<ThresholdPolicy>().map_err(|reason| ConfigError::Invalid {
                name: "AUTOENCODER_THRESHOLD",
                reason,
            })?,
            Err(_) => defaults.threshold,
        };

        let explain = match env::var("EXPLAIN_METHOD") {
            Ok(value) => value.parse::<ExplainPreference>().map_err(|reason| ConfigError::Invalid {
                name: "EXPLAIN_METHOD",
                reason,
            })?,
            Err(_) => defaults.explain,
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            models_dir: env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),

            models,

            default_model: env::var("DEFAULT_MODEL").unwrap_or(defaults.default_model),

            threshold,
            explain,

            onnx_threads: env::var("ONNX_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .filter(|&t| t > 0)
                .unwrap_or(defaults.onnx_threads),

            max_upload_mb: env::var("MAX_UPLOAD_MB")
                .ok()
                .and_then(|m| m.parse().ok())
                .unwrap_or(defaults.max_upload_mb),

            log_format,
        })
    }

    /// Options handed to every model at load time
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            threshold: self.threshold,
            explain: self.explain,
            onnx_threads: self.onnx_threads,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
