//! Features Module - Feature Alignment
//!
//! Owns the per-model feature layout and the step that maps raw records
//! onto it. Everything downstream assumes columns are in layout order.

pub mod layout;
pub mod align;


// Re-export common types
pub use layout::FeatureSet;
pub use align::{align, align_one, Matrix, Row};
