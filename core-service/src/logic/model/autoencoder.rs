//! Autoencoder adapter
//!
//! Runs the scaled batch through the reconstruction network and scores each
//! row by its mean squared reconstruction error (MSE). `score = -mse`, so
//! higher still means more normal. A row is normal iff `mse < threshold`,
//! where the threshold comes from the configured `ThresholdPolicy`.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::adapter::{Label, ModelAdapter, ModelKind, Scored, Verdict};
use super::runtime::Reconstruct;
use super::threshold::ThresholdPolicy;
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::explain::ExplanationMethod;

pub struct AutoencoderAdapter {
    network: Box<dyn Reconstruct>,
    threshold: ThresholdPolicy,
}

impl AutoencoderAdapter {
    pub fn new(network: Box<dyn Reconstruct>, threshold: ThresholdPolicy) -> Self {
        Self { network, threshold }
    }

    pub fn threshold_policy(&self) -> ThresholdPolicy {
        self.threshold
    }

    /// Squared error per cell, rows x features
    pub fn squared_errors(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
        let reconstruction = self.network.reconstruct(scaled)?;
        if reconstruction.dim() != scaled.dim() {
            return Err(DetectorError::Inference(format!(
                "reconstruction shape {:?} does not match input {:?}",
                reconstruction.dim(),
                scaled.dim()
            )));
        }

        let diff = &scaled - &reconstruction;
        Ok(diff.mapv(|d| d * d))
    }

    /// Mean squared reconstruction error per row
    pub fn reconstruction_error(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array1<f64>> {
        if scaled.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }
        row_means(&self.squared_errors(scaled)?)
    }

    /// Label rows against the threshold resolved over this batch
    fn verdicts(&self, errors: &Array1<f64>) -> Vec<Verdict> {
        let errors = errors.to_vec();

        let Some(threshold) = self.threshold.resolve(&errors) else {
            return Vec::new();
        };
        log::debug!(
            "Autoencoder threshold {:.6} ({}) over {} rows",
            threshold,
            self.threshold,
            errors.len()
        );

        errors
            .iter()
            .map(|&mse| Verdict {
                label: if mse < threshold { Label::Normal } else { Label::Anomaly },
                score: -mse,
            })
            .collect()
    }
}

fn row_means(squared: &Array2<f64>) -> DetectorResult<Array1<f64>> {
    squared
        .mean_axis(Axis(1))
        .ok_or_else(|| DetectorError::Inference("matrix has no columns".to_string()))
}

impl ModelAdapter for AutoencoderAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::Autoencoder
    }

    fn backend(&self) -> &'static str {
        self.network.backend()
    }

    fn score(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array1<f64>> {
        Ok(self.reconstruction_error(scaled)?.mapv(|mse| -mse))
    }

    fn predict(&self, scaled: ArrayView2<f64>) -> DetectorResult<Vec<Verdict>> {
        Ok(self.verdicts(&self.reconstruction_error(scaled)?))
    }

    /// One reconstruction pass feeds both the labels and the attribution
    fn predict_scored(&self, scaled: ArrayView2<f64>) -> DetectorResult<Scored> {
        if scaled.nrows() == 0 {
            return Ok(Scored {
                verdicts: Vec::new(),
                attribution: None,
            });
        }

        let squared = self.squared_errors(scaled)?;
        let verdicts = self.verdicts(&row_means(&squared)?);
        Ok(Scored {
            verdicts,
            attribution: Some(squared),
        })
    }

    fn native_explanation(&self) -> Option<ExplanationMethod> {
        Some(ExplanationMethod::AutoencoderReconstruction)
    }

    /// Per-feature squared reconstruction error
    fn attribute(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
        self.squared_errors(scaled)
    }
}
