//! Scaler Adapter
//!
//! Applies the per-column transform fitted at training time. Both
//! variants are linear and deterministic: the same matrix always yields
//! bit-identical output.

use std::path::Path;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::logic::error::{DetectorError, DetectorResult};

/// Scaled matrix, same shape as the aligned input
pub type ScaledMatrix = Array2<f64>;

/// Fitted scaler parameters (`scaler.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`; a zero scale is treated as 1
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `(x - min) / (max - min)`; an empty range is treated as 1
    MinMax { min: Vec<f64>, max: Vec<f64> },
}

impl Scaler {
    pub fn from_file(path: &Path) -> DetectorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DetectorError::artifact(path, e))?;
        let scaler: Scaler =
            serde_json::from_str(&raw).map_err(|e| DetectorError::artifact(path, e))?;
        scaler.validate().map_err(|e| DetectorError::artifact(path, e))?;
        Ok(scaler)
    }

    /// Identity standardization for `n` columns
    pub fn identity(n: usize) -> Self {
        Scaler::Standard {
            mean: vec![0.0; n],
            scale: vec![1.0; n],
        }
    }

    /// Number of input columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { min, .. } => min.len(),
        }
    }

    fn validate(&self) -> DetectorResult<()> {
        let (a, b) = match self {
            Scaler::Standard { mean, scale } => (mean, scale),
            Scaler::MinMax { min, max } => (min, max),
        };

        if a.is_empty() || a.len() != b.len() {
            return Err(DetectorError::InvalidArtifact(format!(
                "scaler parameter lengths disagree ({} vs {})",
                a.len(),
                b.len()
            )));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(DetectorError::InvalidArtifact(
                "scaler parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-column `(offset, divisor)` so both variants share one loop
    fn coefficients(&self) -> Vec<(f64, f64)> {
        match self {
            Scaler::Standard { mean, scale } => mean
                .iter()
                .zip(scale)
                .map(|(&m, &s)| (m, if s == 0.0 { 1.0 } else { s }))
                .collect(),
            Scaler::MinMax { min, max } => min
                .iter()
                .zip(max)
                .map(|(&lo, &hi)| {
                    let range = hi - lo;
                    (lo, if range <= 0.0 { 1.0 } else { range })
                })
                .collect(),
        }
    }

    /// Apply the fitted transform to an aligned matrix
    pub fn transform(&self, matrix: ArrayView2<f64>) -> DetectorResult<ScaledMatrix> {
        let expected = self.n_features();
        if matrix.ncols() != expected {
            return Err(DetectorError::ScalerDimension {
                expected,
                actual: matrix.ncols(),
            });
        }

        let coefficients = self.coefficients();
        let mut scaled = matrix.to_owned();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            for (value, &(offset, divisor)) in row.iter_mut().zip(&coefficients) {
                *value = (*value - offset) / divisor;
            }
        }

        Ok(scaled)
    }
}
