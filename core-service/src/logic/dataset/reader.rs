use serde_json::Value;

use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::features::{FeatureSet, Row};

/// Parsed CSV upload: header plus one `Row` per record
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl CsvTable {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }

    /// Layout features absent from the header, in layout order
    pub fn missing_features(&self, features: &FeatureSet) -> Vec<String> {
        features.missing_from(self.columns())
    }
}

/// Parse CSV bytes. Cells stay text; the aligner converts them and reports
/// non-numeric values per column.
pub fn read_csv(data: &[u8]) -> DetectorResult<CsvTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DetectorError::InvalidCsv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(DetectorError::InvalidCsv("missing header row".to_string()));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| DetectorError::InvalidCsv(format!("record {}: {}", line + 1, e)))?;

        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.clone(), Value::String(cell.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(CsvTable { headers, rows })
}
