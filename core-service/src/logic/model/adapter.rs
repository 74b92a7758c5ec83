//! Model Adapter interface
//!
//! Both detectors sit behind `ModelAdapter` and emit the same label
//! convention (`Normal = 1`, `Anomaly = 0`) with "higher score means more
//! normal". Any native convention is translated inside the adapter, so
//! callers never branch on model kind.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::explain::ExplanationMethod;

// ============================================================================
// MODEL KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    IsolationForest,
    Autoencoder,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::IsolationForest => "isolation_forest",
            ModelKind::Autoencoder => "autoencoder",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "isolation_forest" | "iforest" => Ok(ModelKind::IsolationForest),
            "autoencoder" => Ok(ModelKind::Autoencoder),
            other => Err(format!("unknown model kind '{}'", other)),
        }
    }
}

// ============================================================================
// LABELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Anomaly = 0,
    Normal = 1,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Isolation forests vote `+1` for inliers and `-1` for outliers
    pub fn from_isolation_forest(raw: i8) -> Self {
        if raw == -1 {
            Label::Anomaly
        } else {
            Label::Normal
        }
    }
}

/// Per-row model output after label normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub label: Label,
    pub score: f64,
}

/// Verdicts for a batch, plus per-feature contributions when the model
/// produced them while scoring
#[derive(Debug, Clone)]
pub struct Scored {
    pub verdicts: Vec<Verdict>,
    pub attribution: Option<Array2<f64>>,
}

// ============================================================================
// ADAPTER TRAIT
// ============================================================================

/// Trait for loaded detectors (native forest, ONNX graph, ...)
pub trait ModelAdapter: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Short backend name for status output ("native", "onnx", ...)
    fn backend(&self) -> &'static str;

    /// Per-row score, higher means more normal. Independent of batch
    /// composition, so it can be evaluated on synthetic rows.
    fn score(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array1<f64>>;

    /// Labels and scores for a batch
    fn predict(&self, scaled: ArrayView2<f64>) -> DetectorResult<Vec<Verdict>>;

    /// `predict`, keeping any attribution computed along the way so the
    /// explainer does not run the model a second time
    fn predict_scored(&self, scaled: ArrayView2<f64>) -> DetectorResult<Scored> {
        Ok(Scored {
            verdicts: self.predict(scaled)?,
            attribution: None,
        })
    }

    /// Which model-aware attribution this adapter can produce, if any
    fn native_explanation(&self) -> Option<ExplanationMethod> {
        None
    }

    /// Per-row, per-feature contributions (rows x features). Signs are
    /// allowed; the explainer takes magnitudes.
    fn attribute(&self, _scaled: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
        Err(DetectorError::Inference(format!(
            "{} model has no native attribution",
            self.kind()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_forest_label_mapping() {
        assert_eq!(Label::from_isolation_forest(-1), Label::Anomaly);
        assert_eq!(Label::from_isolation_forest(1), Label::Normal);
        assert_eq!(Label::from_isolation_forest(-1).as_u8(), 0);
        assert_eq!(Label::from_isolation_forest(1).as_u8(), 1);
    }

    #[test]
    fn test_model_kind_parse() {
        assert_eq!("autoencoder".parse::<ModelKind>(), Ok(ModelKind::Autoencoder));
        assert_eq!("isolation_forest".parse::<ModelKind>(), Ok(ModelKind::IsolationForest));
        assert!("svm".parse::<ModelKind>().is_err());
        assert_eq!(ModelKind::IsolationForest.to_string(), "isolation_forest");
    }
}
