//! Prediction Service
//!
//! Pipeline per call: align -> scale -> predict -> explain -> assemble.
//! Output order follows input order. Nothing shared is mutated, so one
//! service instance handles any number of concurrent calls.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::explain::{ExplanationMethod, FeatureImportance};
use crate::logic::features::{align, Row};
use crate::logic::model::{ScaledMatrix, Scored};
use crate::logic::registry::ModelRegistry;

/// Per-row prediction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 1 = normal, 0 = anomaly
    pub prediction: u8,
    /// Higher means more normal; scale differs by model kind
    pub score: f64,
    pub top_features: Vec<FeatureImportance>,
    pub explanation_method: ExplanationMethod,
}

#[derive(Clone)]
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn available_models(&self) -> Vec<String> {
        self.registry.available()
    }

    /// Fail with the exact missing names if `columns` lacks any feature the
    /// model needs. Used for uploads, before any inference runs.
    pub fn check_columns<'a, I>(&self, model_id: &str, columns: I) -> DetectorResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let model = self.registry.get(model_id)?;
        let missing = model.features().missing_from(columns);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DetectorError::MissingColumns(missing))
        }
    }

    pub fn predict_on_rows(&self, rows: &[Row], model_id: &str) -> DetectorResult<Vec<PredictionResult>> {
        let start_time = Instant::now();
        let loaded = self.registry.get(model_id)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = align(rows, loaded.features())?;
        let scaled = loaded.scaler().transform(matrix.view())?;
        if let Some(row) = first_non_finite_row(&scaled) {
            return Err(DetectorError::NonFinite { row, stage: "scaled features" });
        }

        let Scored { verdicts, attribution } = loaded.model().predict_scored(scaled.view())?;
        if verdicts.len() != rows.len() {
            return Err(DetectorError::Inference(format!(
                "model '{}' returned {} predictions for {} rows",
                model_id,
                verdicts.len(),
                rows.len()
            )));
        }
        if let Some(row) = verdicts.iter().position(|v| !v.score.is_finite()) {
            return Err(DetectorError::NonFinite { row, stage: "model score" });
        }

        let explanation = loaded
            .explainer()
            .explain(scaled.view(), loaded.model(), loaded.features(), attribution);

        let results: Vec<PredictionResult> = verdicts
            .into_iter()
            .zip(explanation.rows)
            .map(|(verdict, top_features)| PredictionResult {
                prediction: verdict.label.as_u8(),
                score: verdict.score,
                top_features,
                explanation_method: explanation.method,
            })
            .collect();

        log::debug!(
            "Predicted {} rows with '{}' in {} us (explain: {})",
            results.len(),
            model_id,
            start_time.elapsed().as_micros(),
            explanation.method
        );

        Ok(results)
    }

    pub fn predict_one(&self, row: &Row, model_id: &str) -> DetectorResult<PredictionResult> {
        self.predict_on_rows(std::slice::from_ref(row), model_id)?
            .into_iter()
            .next()
            .ok_or_else(|| DetectorError::Inference("no prediction for single row".to_string()))
    }
}

fn first_non_finite_row(matrix: &ScaledMatrix) -> Option<usize> {
    matrix
        .rows()
        .into_iter()
        .position(|row| row.iter().any(|v| !v.is_finite()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ndarray::{array, Array2, ArrayView2};
    use serde_json::json;

    use super::*;
    use crate::constants::{DEFAULT_FEATURES, FEATURES_FILE, NATIVE_MODEL_FILE, SCALER_FILE};
    use crate::logic::explain::ExplainPreference;
    use crate::logic::features::FeatureSet;
    use crate::logic::model::{
        AutoencoderAdapter, LoadedModel, ModelKind, ModelOptions, Reconstruct, Scaler, ThresholdPolicy,
    };
    use crate::logic::registry::ModelSpec;

    const FOREST_JSON: &str = r#"{
        "max_samples": 16,
        "offset": -0.5,
        "trees": [
            {"nodes": [
                {"feature": 1, "threshold": 2.0, "left": 1, "right": 2},
                {"feature": 3, "threshold": 1.5, "left": 3, "right": 4},
                {"samples": 1},
                {"samples": 12},
                {"samples": 3}
            ]},
            {"nodes": [
                {"feature": 0, "threshold": 1.0, "left": 1, "right": 2},
                {"samples": 14},
                {"samples": 2}
            ]}
        ]
    }"#;

    fn write_forest_artifacts(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(FEATURES_FILE), serde_json::to_string(DEFAULT_FEATURES).unwrap()).unwrap();
        std::fs::write(
            dir.join(SCALER_FILE),
            r#"{"kind":"standard","mean":[1.0,200.0,300.0,5.0,5.0,0.0],"scale":[2.0,100.0,150.0,2.0,2.0,1.0]}"#,
        )
        .unwrap();
        std::fs::write(dir.join(NATIVE_MODEL_FILE), FOREST_JSON).unwrap();
    }

    /// Halves every value, so error grows with the input's magnitude
    struct HalfNetwork;

    impl Reconstruct for HalfNetwork {
        fn reconstruct(&self, input: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
            Ok(input.mapv(|v| v / 2.0))
        }
    }

    /// `HalfNetwork` that counts forward passes
    struct CountingNetwork {
        passes: Arc<AtomicUsize>,
    }

    impl Reconstruct for CountingNetwork {
        fn reconstruct(&self, input: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            HalfNetwork.reconstruct(input)
        }
    }

    fn autoencoder(options: &ModelOptions) -> LoadedModel {
        LoadedModel::new(
            "autoencoder",
            FeatureSet::new(DEFAULT_FEATURES.iter().copied()).unwrap(),
            Scaler::identity(DEFAULT_FEATURES.len()),
            Box::new(AutoencoderAdapter::new(Box::new(HalfNetwork), options.threshold)),
            options,
        )
        .unwrap()
    }

    fn service(options: ModelOptions) -> (PredictionService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        write_forest_artifacts(&dir.path().join("isolation_forest"));

        let mut registry = ModelRegistry::load(
            dir.path(),
            &[ModelSpec::new("isolation_forest", ModelKind::IsolationForest)],
            &options,
        );
        registry.insert(autoencoder(&options));

        (PredictionService::new(Arc::new(registry)), dir)
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn sample_row() -> Row {
        row(json!({
            "duration": 5,
            "src_bytes": 100,
            "dst_bytes": 50,
            "count": 4,
            "srv_count": 2,
            "wrong_fragment": 0
        }))
    }

    #[test]
    fn test_single_row_isolation_forest() {
        let (service, _dir) = service(ModelOptions::default());
        assert_eq!(service.available_models(), vec!["autoencoder", "isolation_forest"]);

        let results = service.predict_on_rows(&[sample_row()], "isolation_forest").unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.prediction == 0 || result.prediction == 1);
        assert!(result.top_features.len() <= 3);
        assert_ne!(result.explanation_method, ExplanationMethod::AutoencoderReconstruction);
        assert_eq!(result.explanation_method, ExplanationMethod::IsolationForestNative);
    }

    #[test]
    fn test_isolation_forest_with_zscore_preference() {
        let options = ModelOptions {
            explain: ExplainPreference::ZScore,
            ..ModelOptions::default()
        };
        let (service, _dir) = service(options);

        let result = service.predict_one(&sample_row(), "isolation_forest").unwrap();
        assert_eq!(result.explanation_method, ExplanationMethod::ZScore);
    }

    #[test]
    fn test_label_follows_decision_sign() {
        let (service, _dir) = service(ModelOptions::default());
        let rows = vec![
            sample_row(),
            row(json!({"duration": 20, "src_bytes": 90000, "count": 30})),
            row(json!({})),
        ];

        let results = service.predict_on_rows(&rows, "isolation_forest").unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            let expected = if result.score < 0.0 { 0 } else { 1 };
            assert_eq!(result.prediction, expected);
        }
        // the large transfer isolates on the first split of both trees
        assert_eq!(results[1].prediction, 0);
    }

    #[test]
    fn test_results_preserve_input_order() {
        let (service, _dir) = service(ModelOptions::default());
        let small = row(json!({"src_bytes": 10}));
        let large = row(json!({"duration": 20, "src_bytes": 90000}));

        let forward = service.predict_on_rows(&[small.clone(), large.clone()], "isolation_forest").unwrap();
        let reverse = service.predict_on_rows(&[large, small], "isolation_forest").unwrap();

        assert_eq!(forward[0].score, reverse[1].score);
        assert_eq!(forward[1].score, reverse[0].score);
    }

    #[test]
    fn test_autoencoder_uniform_batch() {
        let (service, _dir) = service(ModelOptions::default());
        let rows = vec![sample_row(); 5];

        let results = service.predict_on_rows(&rows, "autoencoder").unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.prediction == results[0].prediction));
        assert!(results.iter().all(|r| r.explanation_method == ExplanationMethod::AutoencoderReconstruction));
        assert!(results[0].score <= 0.0);
    }

    #[test]
    fn test_autoencoder_flags_batch_outlier() {
        let (service, _dir) = service(ModelOptions::default());
        let mut rows = vec![row(json!({"count": 1})); 19];
        rows.push(row(json!({"src_bytes": 5000})));

        let results = service.predict_on_rows(&rows, "autoencoder").unwrap();
        assert_eq!(results[19].prediction, 0);
        assert!(results[..19].iter().all(|r| r.prediction == 1));
        assert_eq!(results[19].top_features[0].name(), "src_bytes");
    }

    #[test]
    fn test_autoencoder_fixed_threshold() {
        let options = ModelOptions {
            threshold: ThresholdPolicy::Fixed(1.0),
            ..ModelOptions::default()
        };
        let (service, _dir) = service(options);

        let result = service.predict_one(&row(json!({"count": 1})), "autoencoder").unwrap();
        assert_eq!(result.prediction, 1);
        assert_eq!(
            service.registry().get("autoencoder").unwrap().metadata().threshold,
            Some(ThresholdPolicy::Fixed(1.0))
        );
    }

    #[test]
    fn test_unknown_model_is_client_error() {
        let (service, _dir) = service(ModelOptions::default());
        let err = service.predict_on_rows(&[sample_row()], "foo").unwrap_err();

        assert!(err.is_client_error());
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_non_numeric_value_is_client_error() {
        let (service, _dir) = service(ModelOptions::default());
        let err = service
            .predict_on_rows(&[row(json!({"src_bytes": "many"}))], "isolation_forest")
            .unwrap_err();
        assert!(matches!(err, DetectorError::FeatureType { .. }));
    }

    #[test]
    fn test_check_columns() {
        let (service, _dir) = service(ModelOptions::default());
        assert!(service.check_columns("isolation_forest", DEFAULT_FEATURES.iter().copied()).is_ok());

        match service.check_columns("isolation_forest", ["duration", "count"]) {
            Err(DetectorError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["src_bytes", "dst_bytes", "srv_count", "wrong_fragment"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_batch() {
        let (service, _dir) = service(ModelOptions::default());
        assert!(service.predict_on_rows(&[], "autoencoder").unwrap().is_empty());
    }

    #[test]
    fn test_result_serialization_shape() {
        let result = PredictionResult {
            prediction: 1,
            score: -0.25,
            top_features: vec![FeatureImportance("src_bytes".into(), 2.0)],
            explanation_method: ExplanationMethod::ZScore,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "prediction": 1,
                "score": -0.25,
                "top_features": [["src_bytes", 2.0]],
                "explanation_method": "zscore"
            })
        );
    }

    #[test]
    fn test_scaler_feature_mismatch_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("isolation_forest");
        write_forest_artifacts(&model_dir);
        std::fs::write(model_dir.join(SCALER_FILE), r#"{"kind":"standard","mean":[0.0],"scale":[1.0]}"#).unwrap();

        let registry = ModelRegistry::load(
            dir.path(),
            &[ModelSpec::new("isolation_forest", ModelKind::IsolationForest)],
            &ModelOptions::default(),
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overflowing_error_is_client_error() {
        let (service, _dir) = service(ModelOptions::default());
        let rows = vec![sample_row(), row(json!({"src_bytes": 1e200}))];

        let err = service.predict_on_rows(&rows, "autoencoder").unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(err, DetectorError::NonFinite { row: 1, stage: "model score" }));
    }

    #[test]
    fn test_first_non_finite_row() {
        let clean = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(first_non_finite_row(&clean), None);

        let dirty = array![[1.0, 2.0], [f64::NEG_INFINITY, 4.0], [f64::NAN, 0.0]];
        assert_eq!(first_non_finite_row(&dirty), Some(1));
    }

    #[test]
    fn test_autoencoder_reconstructs_once_per_request() {
        let options = ModelOptions::default();
        let passes = Arc::new(AtomicUsize::new(0));
        let counted = LoadedModel::new(
            "autoencoder",
            FeatureSet::new(DEFAULT_FEATURES.iter().copied()).unwrap(),
            Scaler::identity(DEFAULT_FEATURES.len()),
            Box::new(AutoencoderAdapter::new(
                Box::new(CountingNetwork { passes: passes.clone() }),
                options.threshold,
            )),
            &options,
        )
        .unwrap();
        let mut registry = ModelRegistry::new();
        registry.insert(counted);
        let service = PredictionService::new(Arc::new(registry));

        let results = service.predict_on_rows(&vec![sample_row(); 4], "autoencoder").unwrap();
        assert_eq!(results[0].explanation_method, ExplanationMethod::AutoencoderReconstruction);
        assert_eq!(results[0].top_features[0].name(), "src_bytes");
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        service.predict_one(&sample_row(), "autoencoder").unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }
}
