//! Exact Shapley attribution
//!
//! Explains the model's scalar score against the all-zero baseline, which
//! in standardized space is the training mean. Every coalition is
//! evaluated, so cost grows as `2^n` per row; only used for small layouts.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::constants::MAX_SHAP_FEATURES;
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::model::ModelAdapter;

/// Shapley kernel weight `|S|! (n - |S| - 1)! / n!` for each coalition size
fn coalition_weights(n: usize) -> Vec<f64> {
    let factorial = |k: usize| (1..=k).map(|v| v as f64).product::<f64>();
    let total = factorial(n);
    (0..n)
        .map(|size| factorial(size) * factorial(n - size - 1) / total)
        .collect()
}

/// All `2^n` masked copies of `row`: bit `j` of the row index keeps feature `j`
fn coalition_batch(row: ArrayView1<f64>) -> Array2<f64> {
    let n = row.len();
    let count = 1usize << n;
    let mut batch = Array2::zeros((count, n));

    for mask in 0..count {
        for j in 0..n {
            if mask & (1 << j) != 0 {
                batch[[mask, j]] = row[j];
            }
        }
    }
    batch
}

fn shapley_from_values(values: &Array1<f64>, n: usize, weights: &[f64]) -> Vec<f64> {
    (0..n)
        .map(|j| {
            let bit = 1usize << j;
            (0..values.len())
                .filter(|mask| mask & bit == 0)
                .map(|mask| {
                    let size = mask.count_ones() as usize;
                    weights[size] * (values[mask | bit] - values[mask])
                })
                .sum::<f64>()
        })
        .collect()
}

/// Signed Shapley values, rows x features
pub fn exact_shapley(model: &dyn ModelAdapter, scaled: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
    let (rows, n) = scaled.dim();
    if n > MAX_SHAP_FEATURES {
        return Err(DetectorError::Inference(format!(
            "exact Shapley needs <= {} features, model has {}",
            MAX_SHAP_FEATURES, n
        )));
    }

    let weights = coalition_weights(n);
    let mut contributions = Array2::zeros((rows, n));

    for (i, row) in scaled.rows().into_iter().enumerate() {
        let batch = coalition_batch(row);
        let values = model.score(batch.view())?;
        if values.len() != batch.nrows() {
            return Err(DetectorError::Inference(format!(
                "model scored {} of {} coalitions",
                values.len(),
                batch.nrows()
            )));
        }

        for (j, phi) in shapley_from_values(&values, n, &weights).into_iter().enumerate() {
            contributions[[i, j]] = phi;
        }
    }

    Ok(contributions)
}
