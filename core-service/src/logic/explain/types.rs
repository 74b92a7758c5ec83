use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which explanation branch produced a row's ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplanationMethod {
    #[serde(rename = "autoencoder-reconstruction")]
    AutoencoderReconstruction,
    #[serde(rename = "isolation-forest-native")]
    IsolationForestNative,
    #[serde(rename = "shap")]
    Shap,
    #[serde(rename = "zscore")]
    ZScore,
    #[serde(rename = "raw-magnitude")]
    RawMagnitude,
}

impl ExplanationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplanationMethod::AutoencoderReconstruction => "autoencoder-reconstruction",
            ExplanationMethod::IsolationForestNative => "isolation-forest-native",
            ExplanationMethod::Shap => "shap",
            ExplanationMethod::ZScore => "zscore",
            ExplanationMethod::RawMagnitude => "raw-magnitude",
        }
    }
}

impl fmt::Display for ExplanationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(feature_name, importance)`; serialized as a two-element array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance(pub String, pub f64);

impl FeatureImportance {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn importance(&self) -> f64 {
        self.1
    }
}

/// Ranked features for every row of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub method: ExplanationMethod,
    pub rows: Vec<Vec<FeatureImportance>>,
}

/// Operator preference, resolved against model capabilities at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainPreference {
    /// Model-native attribution when available, z-score otherwise
    #[default]
    Auto,
    Shap,
    ZScore,
    RawMagnitude,
}

impl FromStr for ExplainPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "native" => Ok(ExplainPreference::Auto),
            "shap" => Ok(ExplainPreference::Shap),
            "zscore" | "z-score" => Ok(ExplainPreference::ZScore),
            "raw" | "raw-magnitude" => Ok(ExplainPreference::RawMagnitude),
            other => Err(format!("unknown explain method '{}'", other)),
        }
    }
}
