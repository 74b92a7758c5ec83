//! Network Anomaly Detection - Inference Core
//!
//! Serves predictions from pre-trained anomaly detectors over network-flow
//! feature vectors.
//!
//! ```text
//!  rows ──► align ──► scale ──► model.predict ──► (label, score)
//!                        │                              │
//!                        └──────► explain ──► top features
//! ```
//!
//! Models are loaded once into a [`ModelRegistry`] and shared read-only
//! by the [`PredictionService`].

pub mod constants;
pub mod logic;

pub use logic::dataset::{read_csv, CsvTable};
pub use logic::error::{DetectorError, DetectorResult, ErrorClass};
pub use logic::explain::{ExplainPreference, ExplanationMethod, FeatureImportance};
pub use logic::features::{FeatureSet, Row};
pub use logic::model::{LoadedModel, ModelKind, ModelMetadata, ModelOptions, ThresholdPolicy};
pub use logic::registry::{ModelRegistry, ModelSpec};
pub use logic::service::{PredictionResult, PredictionService};
