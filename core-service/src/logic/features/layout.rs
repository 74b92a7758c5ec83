//! Feature Layout - Per-model Feature Definition
//!
//! **The FeatureSet controls column order for every downstream matrix.**
//!
//! ## Rules:
//! 1. Order comes from the model's `features.json` and never changes after load
//! 2. Names are unique and the list is non-empty
//! 3. Two loaded models may use different layouts
//!
//! The CRC32 layout hash makes it cheap to tell layouts apart in logs and
//! in the `/models` listing.

use std::collections::HashSet;
use std::path::Path;

use crc32fast::Hasher;

use crate::logic::error::{DetectorError, DetectorResult};

// ============================================================================
// FEATURE SET
// ============================================================================

/// Ordered, immutable list of feature names a model expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    names: Vec<String>,
    hash: u32,
}

impl FeatureSet {
    pub fn new<I, S>(names: I) -> DetectorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(DetectorError::InvalidArtifact("feature set is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(DetectorError::InvalidArtifact(format!(
                    "duplicate feature name '{}'",
                    name
                )));
            }
        }

        let hash = compute_layout_hash(&names);
        Ok(Self { names, hash })
    }

    /// Load from a JSON array of names (`features.json`)
    pub fn from_file(path: &Path) -> DetectorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DetectorError::artifact(path, e))?;
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| DetectorError::artifact(path, e))?;
        Self::new(names).map_err(|e| DetectorError::artifact(path, e))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Get feature name by index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn layout_hash(&self) -> u32 {
        self.hash
    }

    /// Names from this set that are absent in `columns`, in layout order
    pub fn missing_from<'a, I>(&self, columns: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: HashSet<&str> = columns.into_iter().collect();
        self.names
            .iter()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect()
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the names in order, NUL-separated
pub fn compute_layout_hash(names: &[String]) -> u32 {
    let mut hasher = Hasher::new();

    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

// ============================================================================
// TESTS
// ============================================================================
