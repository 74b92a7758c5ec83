//! Isolation Forest adapter
//!
//! Two backends:
//! - `Native`: the fitted trees dumped to `model.json` and walked in Rust.
//!   Supports depth-weighted split attribution.
//! - `Onnx`: an exported graph whose `scores` output (else its last output)
//!   is the decision function.
//!
//! Decision function: lower (more negative) means more anomalous. The
//! ensemble's native vote is `+1` inlier / `-1` outlier; it is mapped to
//! `Label` here so the service layer never sees it.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::adapter::{Label, ModelAdapter, ModelKind, Verdict};
use super::runtime::OnnxModel;
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::explain::ExplanationMethod;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ============================================================================
// NATIVE FOREST
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Go `left` when `x[feature] <= threshold`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node; `samples` training points ended here
    Leaf { samples: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

/// Fitted isolation forest (`model.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Sub-sample size each tree was grown on
    pub max_samples: usize,
    /// Subtracted from the raw score; -0.5 for the default contamination
    #[serde(default = "default_offset")]
    pub offset: f64,
    pub trees: Vec<Tree>,
}

fn default_offset() -> f64 {
    -0.5
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl IsolationForest {
    pub fn from_file(path: &Path) -> DetectorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DetectorError::artifact(path, e))?;
        let forest: IsolationForest =
            serde_json::from_str(&raw).map_err(|e| DetectorError::artifact(path, e))?;
        forest.validate().map_err(|e| DetectorError::artifact(path, e))?;
        Ok(forest)
    }

    /// Structural checks so traversal can index without bounds failures
    pub fn validate(&self) -> DetectorResult<()> {
        if self.trees.is_empty() {
            return Err(DetectorError::InvalidArtifact("forest has no trees".to_string()));
        }
        if self.max_samples == 0 {
            return Err(DetectorError::InvalidArtifact("max_samples must be > 0".to_string()));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(DetectorError::InvalidArtifact(format!("tree {} is empty", t)));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                if let Node::Split { left, right, .. } = node {
                    // children always come after their parent, which also rules out cycles
                    let in_range = |c: usize| c > i && c < tree.nodes.len();
                    if !in_range(*left) || !in_range(*right) {
                        return Err(DetectorError::InvalidArtifact(format!(
                            "tree {} node {} has invalid children",
                            t, i
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Highest feature index referenced by any split
    pub fn max_feature_index(&self) -> Option<usize> {
        self.trees
            .iter()
            .flat_map(|t| t.nodes.iter())
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    /// Walk one tree, calling `visit(feature, depth)` for each split passed.
    /// Returns the path length including the leaf correction term.
    fn walk<F>(tree: &Tree, row: ArrayView1<f64>, mut visit: F) -> f64
    where
        F: FnMut(usize, usize),
    {
        let mut index = 0;
        let mut depth = 0;

        loop {
            match &tree.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    visit(*feature, depth);
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                    depth += 1;
                }
                Node::Leaf { samples } => {
                    return depth as f64 + average_path_length(*samples);
                }
            }
        }
    }

    /// Decision function per row; negative means outlier
    pub fn decision_function(&self, scaled: ArrayView2<f64>) -> Array1<f64> {
        let normalizer = average_path_length(self.max_samples).max(f64::EPSILON);
        let n_trees = self.trees.len() as f64;

        scaled
            .rows()
            .into_iter()
            .map(|row| {
                let total: f64 = self
                    .trees
                    .iter()
                    .map(|tree| Self::walk(tree, row, |_, _| {}))
                    .sum();
                let mean_depth = total / n_trees;
                let raw_score = -(2f64.powf(-mean_depth / normalizer));
                raw_score - self.offset
            })
            .collect()
    }

    /// Depth-weighted split attribution: every split on the row's path adds
    /// `1 / (depth + 1)` to its feature, averaged over trees. Features that
    /// isolate the row near the root dominate.
    pub fn split_attribution(&self, scaled: ArrayView2<f64>) -> Array2<f64> {
        let mut contributions = Array2::zeros(scaled.dim());
        let n_trees = self.trees.len() as f64;

        for (i, row) in scaled.rows().into_iter().enumerate() {
            for tree in &self.trees {
                Self::walk(tree, row, |feature, depth| {
                    if feature < contributions.ncols() {
                        contributions[[i, feature]] += 1.0 / (depth as f64 + 1.0);
                    }
                });
            }
        }

        contributions.mapv_inplace(|v| v / n_trees);
        contributions
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

pub enum ForestBackend {
    Native(IsolationForest),
    Onnx(OnnxModel),
}

pub struct IsolationForestAdapter {
    backend: ForestBackend,
}

impl IsolationForestAdapter {
    pub fn native(forest: IsolationForest) -> Self {
        Self {
            backend: ForestBackend::Native(forest),
        }
    }

    pub fn onnx(model: OnnxModel) -> Self {
        Self {
            backend: ForestBackend::Onnx(model),
        }
    }

    /// Raw decision scores from whichever backend is loaded
    pub fn decision_function(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array1<f64>> {
        match &self.backend {
            ForestBackend::Native(forest) => Ok(forest.decision_function(scaled)),
            ForestBackend::Onnx(model) => model.run_scores(scaled),
        }
    }

    /// Ensemble vote in its native `{-1, +1}` convention
    pub fn raw_label(decision: f64) -> i8 {
        if decision < 0.0 {
            -1
        } else {
            1
        }
    }
}

impl ModelAdapter for IsolationForestAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::IsolationForest
    }

    fn backend(&self) -> &'static str {
        match self.backend {
            ForestBackend::Native(_) => "native",
            ForestBackend::Onnx(_) => "onnx",
        }
    }

    fn score(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array1<f64>> {
        self.decision_function(scaled)
    }

    fn predict(&self, scaled: ArrayView2<f64>) -> DetectorResult<Vec<Verdict>> {
        let scores = self.decision_function(scaled)?;

        Ok(scores
            .iter()
            .map(|&score| Verdict {
                label: Label::from_isolation_forest(Self::raw_label(score)),
                score,
            })
            .collect())
    }

    fn native_explanation(&self) -> Option<ExplanationMethod> {
        match self.backend {
            ForestBackend::Native(_) => Some(ExplanationMethod::IsolationForestNative),
            ForestBackend::Onnx(_) => None,
        }
    }

    fn attribute(&self, scaled: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
        match &self.backend {
            ForestBackend::Native(forest) => Ok(forest.split_attribution(scaled)),
            ForestBackend::Onnx(_) => Err(DetectorError::Inference(
                "ONNX isolation forest has no native attribution".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// One stump on feature 0: x <= 0 ends in a crowded leaf, x > 0 isolates fast
    fn stump_forest() -> IsolationForest {
        serde_json::from_str(
            r#"{
                "max_samples": 8,
                "trees": [
                    {"nodes": [
                        {"feature": 0, "threshold": 0.0, "left": 1, "right": 2},
                        {"samples": 7},
                        {"samples": 1}
                    ]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (ln 255 + gamma) - 2 * 255 / 256
        let c = average_path_length(256);
        assert!((c - 10.244_770_920_116_851).abs() < 1e-9);
    }

    #[test]
    fn test_parse_and_validate() {
        let forest = stump_forest();
        assert_eq!(forest.offset, -0.5);
        assert!(forest.validate().is_ok());
        assert_eq!(forest.max_feature_index(), Some(0));

        let broken: IsolationForest = serde_json::from_str(
            r#"{"max_samples": 4, "trees": [{"nodes": [{"feature": 0, "threshold": 0.0, "left": 0, "right": 5}]}]}"#,
        )
        .unwrap();
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_isolated_point_scores_lower() {
        let forest = stump_forest();
        let scores = forest.decision_function(array![[-1.0], [5.0]].view());

        assert!(scores[1] < scores[0]);
        assert!(scores[1] < 0.0, "isolated point should be an outlier");
    }

    #[test]
    fn test_adapter_normalizes_labels() {
        let adapter = IsolationForestAdapter::native(stump_forest());
        let verdicts = adapter.predict(array![[-1.0], [5.0]].view()).unwrap();

        for verdict in &verdicts {
            let expected = if verdict.score < 0.0 { Label::Anomaly } else { Label::Normal };
            assert_eq!(verdict.label, expected);
        }
        assert_eq!(verdicts[1].label, Label::Anomaly);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let adapter = IsolationForestAdapter::native(stump_forest());
        let input = array![[0.3], [-2.0], [9.0]];
        assert_eq!(
            adapter.predict(input.view()).unwrap(),
            adapter.predict(input.view()).unwrap()
        );
    }

    #[test]
    fn test_split_attribution_hits_split_feature() {
        let forest = stump_forest();
        let attribution = forest.split_attribution(array![[5.0, 1.0]].view());
        assert_eq!(attribution[[0, 0]], 1.0);
        assert_eq!(attribution[[0, 1]], 0.0);
    }

    #[test]
    fn test_raw_label_convention() {
        assert_eq!(IsolationForestAdapter::raw_label(-0.01), -1);
        assert_eq!(IsolationForestAdapter::raw_label(0.0), 1);
        assert_eq!(IsolationForestAdapter::raw_label(0.2), 1);
    }
}
