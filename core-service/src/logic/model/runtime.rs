//! ONNX Runtime Integration
//!
//! Loads and runs ONNX graphs. The graph is a black box: a `(rows x features)`
//! f32 matrix goes in, one 2-D output comes back (reconstruction for an
//! autoencoder, decision scores for an exported isolation forest).

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use crate::logic::error::{DetectorError, DetectorResult};

/// Black-box reconstruction network (autoencoder runtime)
pub trait Reconstruct: Send + Sync {
    /// Returns a matrix with the same shape as `input`
    fn reconstruct(&self, input: ArrayView2<f64>) -> DetectorResult<Array2<f64>>;

    fn backend(&self) -> &'static str {
        "custom"
    }
}

/// Which graph output carries the values we want
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSelection {
    /// First output (autoencoder reconstruction)
    First,
    /// Output with this name, else the last one. Exported isolation forests
    /// list the int64 `label` output before the float `scores`.
    NamedOrLast(&'static str),
}

impl OutputSelection {
    /// Pick an output name from the graph's outputs, in graph order
    pub fn pick<'a, I>(&self, names: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        match *self {
            OutputSelection::First => names.first().copied(),
            OutputSelection::NamedOrLast(want) => names
                .iter()
                .copied()
                .find(|name| *name == want)
                .or_else(|| names.last().copied()),
        }
    }
}

/// Fail unless the input's fixed feature dimension (last axis) equals
/// `expected`. Dynamic dimensions (`-1`) and unknown shapes pass.
pub fn check_input_width(shape: Option<&[i64]>, expected: usize, path: &Path) -> DetectorResult<()> {
    match shape.and_then(|dims| dims.last().copied()) {
        Some(width) if width >= 0 && width as usize != expected => Err(DetectorError::artifact(
            path,
            format!("graph expects {} input features but the feature list has {}", width, expected),
        )),
        _ => Ok(()),
    }
}

/// Loaded ONNX session plus the output we read from it
pub struct OnnxModel {
    // Session::run needs exclusive access
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxModel {
    /// Load an ONNX graph whose first input takes `n_features` columns
    pub fn load(path: &Path, threads: usize, n_features: usize, output: OutputSelection) -> DetectorResult<Self> {
        log::info!("Loading ONNX model from: {}", path.display());

        if !path.exists() {
            return Err(DetectorError::artifact(path, "model not found"));
        }

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads.max(1)))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| DetectorError::artifact(path, format!("failed to load model: {}", e)))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| DetectorError::artifact(path, "no input defined"))?;
        check_input_width(input.input_type.tensor_shape().map(|shape| &**shape), n_features, path)?;

        let output_name = output
            .pick(session.outputs.iter().map(|o| o.name.as_str()))
            .map(str::to_string)
            .ok_or_else(|| DetectorError::artifact(path, "no output defined"))?;

        log::info!(
            "ONNX model loaded successfully ({} inputs, reading output '{}')",
            session.inputs.len(),
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }

    /// Run the graph on a batch, returning a `(rows x k)` matrix
    pub fn run(&self, input: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
        let rows = input.nrows();
        if rows == 0 {
            return Ok(Array2::zeros((0, input.ncols())));
        }

        let input_array = input.mapv(|v| v as f32);
        let input_tensor = Value::from_array(input_array)?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_tensor])?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| DetectorError::Inference(format!("no output '{}'", self.output_name)))?;

        let (_, data) = output.try_extract_tensor::<f32>()?;

        if data.len() % rows != 0 {
            return Err(DetectorError::Inference(format!(
                "output of {} values does not split into {} rows",
                data.len(),
                rows
            )));
        }

        let cols = data.len() / rows;
        let values: Vec<f64> = data.iter().map(|&v| v as f64).collect();
        Ok(Array2::from_shape_vec((rows, cols), values)?)
    }

    /// First output column as a per-row vector
    pub fn run_scores(&self, input: ArrayView2<f64>) -> DetectorResult<Array1<f64>> {
        let output = self.run(input)?;
        if output.nrows() > 0 && output.ncols() == 0 {
            return Err(DetectorError::Inference("empty score output".to_string()));
        }
        Ok(output.column(0).to_owned())
    }
}

impl Reconstruct for OnnxModel {
    fn reconstruct(&self, input: ArrayView2<f64>) -> DetectorResult<Array2<f64>> {
        let output = self.run(input)?;
        if output.dim() != input.dim() {
            return Err(DetectorError::Inference(format!(
                "reconstruction shape {:?} does not match input {:?}",
                output.dim(),
                input.dim()
            )));
        }
        Ok(output)
    }

    fn backend(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKLEARN_OUTPUTS: [&str; 2] = ["label", "scores"];

    #[test]
    fn test_named_output_wins() {
        let pick = OutputSelection::NamedOrLast("scores").pick(SKLEARN_OUTPUTS);
        assert_eq!(pick, Some("scores"));
    }

    #[test]
    fn test_missing_name_falls_back_to_last() {
        let pick = OutputSelection::NamedOrLast("scores").pick(["label", "decision"]);
        assert_eq!(pick, Some("decision"));
    }

    #[test]
    fn test_first_output() {
        assert_eq!(OutputSelection::First.pick(["reconstruction", "latent"]), Some("reconstruction"));
        assert_eq!(OutputSelection::First.pick(std::iter::empty()), None);
    }

    #[test]
    fn test_input_width_mismatch_fails_load() {
        let path = Path::new("model.onnx");
        let err = check_input_width(Some(&[-1, 5][..]), 6, path).unwrap_err();
        assert!(matches!(err, DetectorError::ArtifactLoad { .. }));
        assert!(err.to_string().contains("5 input features"));
    }

    #[test]
    fn test_input_width_accepts_match_and_dynamic() {
        let path = Path::new("model.onnx");
        assert!(check_input_width(Some(&[-1, 6][..]), 6, path).is_ok());
        assert!(check_input_width(Some(&[-1, -1][..]), 6, path).is_ok());
        assert!(check_input_width(None, 6, path).is_ok());
    }

    #[test]
    fn test_corrupt_graph_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();

        let err = OnnxModel::load(&path, 1, 6, OutputSelection::First).err().unwrap();
        assert_eq!(err.class(), crate::logic::error::ErrorClass::ArtifactLoad);
    }
}
