//! Dataset Module - Tabular Uploads
//!
//! Reads CSV uploads into `Row`s for the prediction pipeline. The header
//! is checked against the model layout before any inference runs.

pub mod reader;


pub use reader::{CsvTable, read_csv};
