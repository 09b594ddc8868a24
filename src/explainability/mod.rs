//! Model explainability
//!
//! Additive feature attributions in margin space: exact TreeSHAP for the
//! boosted ensemble and mean-centred contributions for the linear baseline.

mod explainer;
pub mod tree_shap;

pub use explainer::{
    attributions, explain, feature_names, try_explain, Explanation, FeatureContribution,
};
pub use tree_shap::{ensemble_shap, tree_shap};
