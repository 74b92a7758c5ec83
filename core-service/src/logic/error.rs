//! Error taxonomy for the inference pipeline
//!
//! Every failure falls into one of three classes:
//! - `ClientInput` - the caller sent something we can't use (bad value,
//!   missing CSV column, unknown model). Never retried.
//! - `ArtifactLoad` - a model's files are missing or corrupt at startup.
//!   The model is left out of the registry.
//! - `InternalInvariant` - dimensions disagree after alignment, or the
//!   runtime returned something malformed. A bug, not a caller problem.

use std::path::PathBuf;

use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientInput,
    ArtifactLoad,
    InternalInvariant,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("feature '{column}' in row {row} is not numeric: {value}")]
    FeatureType {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Missing features: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Model '{model}' not available. Available models: {available:?}")]
    ModelNotFound {
        model: String,
        available: Vec<String>,
    },

    #[error("row {row}: {stage} overflowed to a non-finite value; input is out of range")]
    NonFinite { row: usize, stage: &'static str },

    #[error("invalid CSV upload: {0}")]
    InvalidCsv(String),

    #[error("scaler expects {expected} columns, matrix has {actual}")]
    ScalerDimension { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },
}

impl DetectorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DetectorError::FeatureType { .. }
            | DetectorError::MissingColumns(_)
            | DetectorError::ModelNotFound { .. }
            | DetectorError::NonFinite { .. }
            | DetectorError::InvalidCsv(_) => ErrorClass::ClientInput,
            DetectorError::ArtifactLoad { .. } | DetectorError::InvalidArtifact(_) => {
                ErrorClass::ArtifactLoad
            }
            DetectorError::ScalerDimension { .. } | DetectorError::Inference(_) => {
                ErrorClass::InternalInvariant
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == ErrorClass::ClientInput
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DetectorError::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ort::Error> for DetectorError {
    fn from(err: ort::Error) -> Self {
        DetectorError::Inference(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DetectorError {
    fn from(err: ndarray::ShapeError) -> Self {
        DetectorError::Inference(format!("Array error: {}", err))
    }
}
