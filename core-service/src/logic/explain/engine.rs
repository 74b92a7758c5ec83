use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::shap::exact_shapley;
use super::types::{ExplainPreference, Explanation, ExplanationMethod, FeatureImportance};
use crate::constants::{MAX_SHAP_FEATURES, TOP_FEATURES, ZSCORE_EPSILON};
use crate::logic::features::FeatureSet;
use crate::logic::model::ModelAdapter;

/// Explanation strategy, fixed when the model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Explainer {
    /// Model-aware attribution provided by the adapter itself
    Native(ExplanationMethod),
    /// Exact Shapley values of the model score
    Shap,
    /// `|x - mean| / (std + eps)` over the current batch
    ZScore,
    /// `|x|` of the scaled value, no batch statistics
    RawMagnitude,
}

impl Explainer {
    /// Resolve the operator preference against what the model supports
    pub fn select(preference: ExplainPreference, model: &dyn ModelAdapter, n_features: usize) -> Self {
        let automatic = model
            .native_explanation()
            .map(Explainer::Native)
            .unwrap_or(Explainer::ZScore);

        match preference {
            ExplainPreference::Auto => automatic,
            ExplainPreference::Shap if n_features <= MAX_SHAP_FEATURES => Explainer::Shap,
            ExplainPreference::Shap => {
                log::warn!(
                    "Shapley attribution needs <= {} features (model has {}), using {}",
                    MAX_SHAP_FEATURES,
                    n_features,
                    automatic.method()
                );
                automatic
            }
            ExplainPreference::ZScore => Explainer::ZScore,
            ExplainPreference::RawMagnitude => Explainer::RawMagnitude,
        }
    }

    /// Method tag this explainer reports when it succeeds
    pub fn method(&self) -> ExplanationMethod {
        match self {
            Explainer::Native(method) => *method,
            Explainer::Shap => ExplanationMethod::Shap,
            Explainer::ZScore => ExplanationMethod::ZScore,
            Explainer::RawMagnitude => ExplanationMethod::RawMagnitude,
        }
    }

    /// Rank the top features of every row.
    ///
    /// `precomputed` is attribution the model already produced while
    /// predicting; native explanations use it instead of calling the model
    /// again. A failing model-aware branch falls back to z-score for this
    /// call and the returned tag says so.
    pub fn explain(
        &self,
        scaled: ArrayView2<f64>,
        model: &dyn ModelAdapter,
        features: &FeatureSet,
        precomputed: Option<Array2<f64>>,
    ) -> Explanation {
        let attempted = match self {
            Explainer::Native(_) => Some(match precomputed {
                Some(contributions) => Ok(contributions),
                None => model.attribute(scaled),
            }),
            Explainer::Shap => Some(exact_shapley(model, scaled)),
            Explainer::ZScore | Explainer::RawMagnitude => None,
        };

        let (method, importance) = match attempted {
            Some(Ok(contributions)) if contributions.dim() == scaled.dim() => {
                (self.method(), contributions.mapv(f64::abs))
            }
            Some(Ok(contributions)) => {
                log::warn!(
                    "{} attribution returned shape {:?} for input {:?}, using zscore",
                    self.method(),
                    contributions.dim(),
                    scaled.dim()
                );
                (ExplanationMethod::ZScore, zscore_importance(scaled))
            }
            Some(Err(e)) => {
                log::warn!("{} attribution failed ({}), using zscore", self.method(), e);
                (ExplanationMethod::ZScore, zscore_importance(scaled))
            }
            None if *self == Explainer::RawMagnitude => {
                (ExplanationMethod::RawMagnitude, scaled.mapv(f64::abs))
            }
            None => (ExplanationMethod::ZScore, zscore_importance(scaled)),
        };

        let rows = importance
            .rows()
            .into_iter()
            .map(|row| rank_top(row, features, TOP_FEATURES))
            .collect();

        Explanation { method, rows }
    }
}

/// Per-cell deviation from the batch column mean in units of batch std
pub fn zscore_importance(scaled: ArrayView2<f64>) -> Array2<f64> {
    let Some(mean) = scaled.mean_axis(Axis(0)) else {
        return Array2::zeros(scaled.dim());
    };
    let std = scaled.std_axis(Axis(0), 0.0) + ZSCORE_EPSILON;

    let mut importance = &scaled - &mean;
    importance.mapv_inplace(f64::abs);
    importance / &std
}

/// Top `k` features by importance, descending. Ties keep layout order,
/// NaN counts as 0 and `+inf` ranks first.
pub fn rank_top(importance: ArrayView1<f64>, features: &FeatureSet, k: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<(usize, f64)> = importance
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { v })
        .enumerate()
        .collect();

    // stable sort keeps layout order for exact ties
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);

    ranked
        .into_iter()
        .map(|(j, v)| FeatureImportance(features.name(j).unwrap_or("unknown").to_string(), v))
        .collect()
}
