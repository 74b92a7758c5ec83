//! Model Module - AI/ML Inference Engine
//!
//! Scaler, detectors and the bundle that ties them to a feature layout.
//! Detectors sit behind `ModelAdapter`, so the service can swap or mix
//! models without knowing which one it is talking to.

pub mod adapter;
pub mod autoencoder;
pub mod isolation_forest;
pub mod loaded;
pub mod runtime;
pub mod scaler;
pub mod threshold;

// Re-export common types
pub use adapter::{Label, ModelAdapter, ModelKind, Scored, Verdict};
pub use autoencoder::AutoencoderAdapter;
pub use isolation_forest::{IsolationForest, IsolationForestAdapter};
pub use loaded::{LoadedModel, ModelMetadata, ModelOptions};
pub use runtime::{OnnxModel, OutputSelection, Reconstruct};
pub use scaler::{ScaledMatrix, Scaler};
pub use threshold::ThresholdPolicy;
