//! Explain Module - Feature Attribution
//!
//! Ranks the features that drove each row's score. The strategy is picked
//! once per loaded model (native attribution, Shapley, z-score or raw
//! magnitude); the result always names the branch that actually ran.

pub mod types;
pub mod engine;
pub mod shap;


pub use types::{ExplainPreference, Explanation, ExplanationMethod, FeatureImportance};
pub use engine::{rank_top, zscore_importance, Explainer};
