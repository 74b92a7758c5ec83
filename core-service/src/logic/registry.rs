//! Model Registry
//!
//! `{model id -> LoadedModel}` built once at startup, read-only afterwards.
//! A model whose artifacts fail to load is logged and left out; startup
//! carries on with whatever did load.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::model::{LoadedModel, ModelKind, ModelOptions};

/// Which model to load: directory name plus detector kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: String,
    pub kind: ModelKind,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, kind: ModelKind) -> Self {
        Self { id: id.into(), kind }
    }

    /// Parse a comma-separated list of specs, e.g. `isolation_forest,ae:autoencoder`
    pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<ModelSpec>)
            .collect()
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.kind)
    }
}

impl FromStr for ModelSpec {
    type Err = String;

    /// `id:kind`, or just `id` when the id names the kind
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, kind) = match s.split_once(':') {
            Some((id, kind)) => (id.trim(), kind.parse()?),
            None => (s.trim(), s.parse()?),
        };

        if id.is_empty() {
            return Err(format!("empty model id in '{}'", s));
        }
        Ok(ModelSpec::new(id, kind))
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, LoadedModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every spec from `models_dir/<id>/`, skipping the ones that fail
    pub fn load(models_dir: &Path, specs: &[ModelSpec], options: &ModelOptions) -> Self {
        let mut registry = Self::new();

        for spec in specs {
            let dir = models_dir.join(&spec.id);
            match LoadedModel::load(&spec.id, spec.kind, &dir, options) {
                Ok(model) => {
                    let meta = model.metadata();
                    log::info!(
                        "Loaded model '{}' ({}, {} backend, {} features, layout {:08x}, explain: {})",
                        spec.id,
                        spec.kind,
                        meta.backend,
                        meta.feature_names.len(),
                        meta.layout_hash,
                        meta.explanation_method
                    );
                    registry.insert(model);
                }
                Err(e) => {
                    log::warn!("Failed to load model '{}', skipping: {}", spec.id, e);
                }
            }
        }

        if registry.is_empty() {
            log::warn!("No models loaded from {}", models_dir.display());
        }

        registry
    }

    /// Add a model; a later insert with the same id replaces the earlier one
    pub fn insert(&mut self, model: LoadedModel) {
        self.models.insert(model.id().to_string(), model);
    }

    pub fn get(&self, id: &str) -> DetectorResult<&LoadedModel> {
        self.models.get(id).ok_or_else(|| DetectorError::ModelNotFound {
            model: id.to_string(),
            available: self.available(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Loaded model ids, sorted
    pub fn available(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn models(&self) -> impl Iterator<Item = &LoadedModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl FromIterator<LoadedModel> for ModelRegistry {
    fn from_iter<I: IntoIterator<Item = LoadedModel>>(iter: I) -> Self {
        let mut registry = Self::new();
        for model in iter {
            registry.insert(model);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_specs() {
        let specs = ModelSpec::parse_list("isolation_forest, ae:autoencoder ,").unwrap();
        assert_eq!(
            specs,
            vec![
                ModelSpec::new("isolation_forest", ModelKind::IsolationForest),
                ModelSpec::new("ae", ModelKind::Autoencoder),
            ]
        );

        assert!(ModelSpec::parse_list("custom").is_err());
        assert!(ModelSpec::parse_list(":autoencoder").is_err());
    }

    #[test]
    fn test_spec_display() {
        let spec = ModelSpec::new("if_v2", ModelKind::IsolationForest);
        assert_eq!(spec.to_string(), "if_v2:isolation_forest");
        assert_eq!(spec.to_string().parse::<ModelSpec>(), Ok(spec));
    }

    #[test]
    fn test_unknown_model_lists_available() {
        let registry = ModelRegistry::new();
        match registry.get("foo") {
            Err(DetectorError::ModelNotFound { model, available }) => {
                assert_eq!(model, "foo");
                assert!(available.is_empty());
            }
            _ => panic!("expected ModelNotFound"),
        }
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::load(
            dir.path(),
            &[ModelSpec::new("autoencoder", ModelKind::Autoencoder)],
            &ModelOptions::default(),
        );
        assert!(registry.is_empty());
        assert!(!registry.contains("autoencoder"));
    }

    #[test]
    fn test_corrupt_onnx_graph_is_skipped() {
        use crate::constants::{DEFAULT_FEATURES, FEATURES_FILE, ONNX_MODEL_FILE, SCALER_FILE};

        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("autoencoder");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join(FEATURES_FILE), serde_json::to_string(DEFAULT_FEATURES).unwrap()).unwrap();
        std::fs::write(
            model_dir.join(SCALER_FILE),
            r#"{"kind":"standard","mean":[0.0,0.0,0.0,0.0,0.0,0.0],"scale":[1.0,1.0,1.0,1.0,1.0,1.0]}"#,
        )
        .unwrap();
        std::fs::write(model_dir.join(ONNX_MODEL_FILE), b"not an onnx graph").unwrap();

        let registry = ModelRegistry::load(
            dir.path(),
            &[ModelSpec::new("autoencoder", ModelKind::Autoencoder)],
            &ModelOptions::default(),
        );
        assert!(registry.is_empty());
    }
}
