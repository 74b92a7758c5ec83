//! LoadedModel - one model's artifacts bundled for serving
//!
//! Built once at startup from `<models_dir>/<id>/` and never mutated
//! afterwards, so concurrent requests share it without locking.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::adapter::{ModelAdapter, ModelKind};
use super::autoencoder::AutoencoderAdapter;
use super::isolation_forest::{IsolationForest, IsolationForestAdapter};
use super::runtime::{OnnxModel, OutputSelection};
use super::scaler::Scaler;
use super::threshold::ThresholdPolicy;
use crate::constants::{FEATURES_FILE, NATIVE_MODEL_FILE, ONNX_MODEL_FILE, SCALER_FILE};
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::explain::{ExplainPreference, ExplanationMethod, Explainer};
use crate::logic::features::FeatureSet;

/// Load-time options shared by every model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    pub threshold: ThresholdPolicy,
    pub explain: ExplainPreference,
    pub onnx_threads: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            threshold: ThresholdPolicy::default(),
            explain: ExplainPreference::Auto,
            onnx_threads: 1,
        }
    }
}

/// Model metadata for status output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: String,
    pub kind: ModelKind,
    pub backend: String,
    pub feature_names: Vec<String>,
    pub layout_hash: u32,
    pub explanation_method: ExplanationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdPolicy>,
    pub loaded_at: DateTime<Utc>,
}

pub struct LoadedModel {
    id: String,
    features: FeatureSet,
    scaler: Scaler,
    model: Box<dyn ModelAdapter>,
    explainer: Explainer,
    metadata: ModelMetadata,
}

impl LoadedModel {
    /// Bundle already-loaded parts. Fails if the scaler was fitted on a
    /// different number of columns than the feature list.
    pub fn new(
        id: impl Into<String>,
        features: FeatureSet,
        scaler: Scaler,
        model: Box<dyn ModelAdapter>,
        options: &ModelOptions,
    ) -> DetectorResult<Self> {
        let id = id.into();

        if scaler.n_features() != features.len() {
            return Err(DetectorError::InvalidArtifact(format!(
                "model '{}': scaler has {} columns but feature list has {}",
                id,
                scaler.n_features(),
                features.len()
            )));
        }

        let explainer = Explainer::select(options.explain, model.as_ref(), features.len());
        let threshold = match model.kind() {
            ModelKind::Autoencoder => Some(options.threshold),
            ModelKind::IsolationForest => None,
        };

        let metadata = ModelMetadata {
            id: id.clone(),
            kind: model.kind(),
            backend: model.backend().to_string(),
            feature_names: features.names().to_vec(),
            layout_hash: features.layout_hash(),
            explanation_method: explainer.method(),
            threshold,
            loaded_at: Utc::now(),
        };

        Ok(Self {
            id,
            features,
            scaler,
            model,
            explainer,
            metadata,
        })
    }

    /// Load `features.json`, `scaler.json` and the model file from `dir`
    pub fn load(id: &str, kind: ModelKind, dir: &Path, options: &ModelOptions) -> DetectorResult<Self> {
        if !dir.is_dir() {
            return Err(DetectorError::artifact(dir, "model directory not found"));
        }

        let features = FeatureSet::from_file(&dir.join(FEATURES_FILE))?;
        let scaler = Scaler::from_file(&dir.join(SCALER_FILE))?;

        let model: Box<dyn ModelAdapter> = match kind {
            ModelKind::IsolationForest => Box::new(load_forest(dir, &features, options)?),
            ModelKind::Autoencoder => {
                let path = dir.join(ONNX_MODEL_FILE);
                let network = OnnxModel::load(&path, options.onnx_threads, features.len(), OutputSelection::First)?;
                Box::new(AutoencoderAdapter::new(Box::new(network), options.threshold))
            }
        };

        Self::new(id, features, scaler, model, options)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn model(&self) -> &dyn ModelAdapter {
        self.model.as_ref()
    }

    pub fn explainer(&self) -> Explainer {
        self.explainer
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// Native tree dump wins over an ONNX export when both are present
fn load_forest(dir: &Path, features: &FeatureSet, options: &ModelOptions) -> DetectorResult<IsolationForestAdapter> {
    let native = dir.join(NATIVE_MODEL_FILE);
    if native.exists() {
        let forest = IsolationForest::from_file(&native)?;
        if let Some(max) = forest.max_feature_index() {
            if max >= features.len() {
                return Err(DetectorError::artifact(
                    &native,
                    format!("split on feature {} but only {} features", max, features.len()),
                ));
            }
        }
        return Ok(IsolationForestAdapter::native(forest));
    }

    let onnx = dir.join(ONNX_MODEL_FILE);
    if onnx.exists() {
        let model = OnnxModel::load(
            &onnx,
            options.onnx_threads,
            features.len(),
            OutputSelection::NamedOrLast("scores"),
        )?;
        return Ok(IsolationForestAdapter::onnx(model));
    }

    Err(DetectorError::artifact(
        dir,
        format!("neither {} nor {} found", NATIVE_MODEL_FILE, ONNX_MODEL_FILE),
    ))
}
