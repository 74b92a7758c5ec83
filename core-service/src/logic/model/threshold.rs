//! Anomaly Threshold Policy
//!
//! Decides the reconstruction-error cut-off for the autoencoder.
//!
//! **Semantic hazard:** with `BatchPercentile` the threshold is computed from
//! the batch being scored. The same row can be labelled differently
//! depending on what else was submitted with it, and scores from different
//! batches are not comparable. Use `Fixed` when results must be stable
//! across requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_THRESHOLD_PERCENTILE;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Percentile (0-100) of the current batch's errors
    BatchPercentile(f64),
    /// Constant error threshold
    Fixed(f64),
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::BatchPercentile(DEFAULT_THRESHOLD_PERCENTILE)
    }
}

impl ThresholdPolicy {
    /// Threshold for this batch of errors. `None` for an empty batch.
    pub fn resolve(&self, errors: &[f64]) -> Option<f64> {
        match *self {
            ThresholdPolicy::BatchPercentile(p) => percentile(errors, p),
            ThresholdPolicy::Fixed(t) => Some(t),
        }
    }
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdPolicy::BatchPercentile(p) => write!(f, "batch:{}", p),
            ThresholdPolicy::Fixed(t) => write!(f, "fixed:{}", t),
        }
    }
}

impl FromStr for ThresholdPolicy {
    type Err = String;

    /// Parses `batch:<percentile>` or `fixed:<threshold>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'batch:<p>' or 'fixed:<t>', got '{}'", s))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid threshold value '{}'", value))?;

        if !value.is_finite() {
            return Err(format!("threshold value must be finite, got '{}'", value));
        }

        match kind.trim() {
            "batch" if (0.0..=100.0).contains(&value) => Ok(ThresholdPolicy::BatchPercentile(value)),
            "batch" => Err(format!("percentile must be within 0..=100, got {}", value)),
            "fixed" => Ok(ThresholdPolicy::Fixed(value)),
            other => Err(format!("unknown threshold policy '{}'", other)),
        }
    }
}

/// Percentile with linear interpolation between closest ranks
/// (same definition numpy uses by default).
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        assert_eq!(ThresholdPolicy::default(), ThresholdPolicy::BatchPercentile(95.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        // rank = 0.95 * 4 = 3.8 -> 4 + 0.8
        let p95 = percentile(&values, 95.0).unwrap();
        assert!((p95 - 4.8).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_unsorted_and_empty() {
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 50.0), Some(2.0));
        assert_eq!(percentile(&[], 95.0), None);
        assert_eq!(percentile(&[7.0], 95.0), Some(7.0));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(ThresholdPolicy::Fixed(0.01).resolve(&[]), Some(0.01));
        assert_eq!(ThresholdPolicy::BatchPercentile(95.0).resolve(&[]), None);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("batch:95".parse::<ThresholdPolicy>(), Ok(ThresholdPolicy::BatchPercentile(95.0)));
        assert_eq!("fixed:0.01".parse::<ThresholdPolicy>(), Ok(ThresholdPolicy::Fixed(0.01)));
        assert!("batch:150".parse::<ThresholdPolicy>().is_err());
        assert!("median".parse::<ThresholdPolicy>().is_err());
        assert!("fixed:abc".parse::<ThresholdPolicy>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let policy = ThresholdPolicy::Fixed(0.25);
        assert_eq!(policy.to_string().parse::<ThresholdPolicy>(), Ok(policy));
    }
}
