//! Feature Aligner
//!
//! Turns loosely-shaped input records into a dense matrix whose columns
//! follow a `FeatureSet` exactly. Missing columns become `0.0`, unknown
//! columns are dropped. Only a value that is present but not numeric fails.

use ndarray::Array2;
use serde_json::{Map, Value};

use super::layout::FeatureSet;
use crate::logic::error::{DetectorError, DetectorResult};

/// One input record: feature name -> value (extra or missing keys allowed)
pub type Row = Map<String, Value>;

/// Dense row-major feature matrix, columns in `FeatureSet` order
pub type Matrix = Array2<f64>;

/// Align a batch of rows against `features`
pub fn align(rows: &[Row], features: &FeatureSet) -> DetectorResult<Matrix> {
    let mut matrix = Matrix::zeros((rows.len(), features.len()));

    for (i, row) in rows.iter().enumerate() {
        for (j, name) in features.names().iter().enumerate() {
            if let Some(value) = row.get(name) {
                matrix[[i, j]] = to_feature_value(value).ok_or_else(|| {
                    DetectorError::FeatureType {
                        row: i,
                        column: name.clone(),
                        value: value.to_string(),
                    }
                })?;
            }
        }
    }

    Ok(matrix)
}

/// Align a single record (1 x n matrix)
pub fn align_one(row: &Row, features: &FeatureSet) -> DetectorResult<Matrix> {
    align(std::slice::from_ref(row), features)
}

/// Numeric view of a JSON value.
///
/// `null` and empty strings count as absent (0.0); numeric strings are
/// accepted since CSV cells arrive as text. Non-finite values are rejected.
fn to_feature_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => Some(0.0),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    parsed.filter(|v| v.is_finite())
}
