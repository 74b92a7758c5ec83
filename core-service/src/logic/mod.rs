//! Logic Module - Inference Pipeline
//!
//! - `features/` - per-model layout and record alignment
//! - `model/` - scaler, detectors (isolation forest, autoencoder), ONNX runtime
//! - `explain/` - feature attribution and ranking
//! - `dataset/` - CSV uploads
//! - `registry` / `service` - loaded models and the prediction pipeline

pub mod error;
pub mod features;
pub mod model;
pub mod explain;
pub mod dataset;
pub mod registry;
pub mod service;
