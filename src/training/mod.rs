//! Model training
//!
//! - [`linear_models`] logistic-regression baseline
//! - [`xgboost`] gradient-boosted trees (the champion)
//! - [`metrics`] held-out evaluation and the `metrics.json` report
//! - [`engine`] the end-to-end training run

mod engine;
pub mod linear_models;
pub mod metrics;
pub mod xgboost;

pub use engine::{
    split_columns_by_type, stratified_split, TrainingConfig, TrainingOrchestrator, TrainingOutcome,
};
pub use linear_models::LogisticRegression;
pub use metrics::{roc_auc, ClassificationMetrics, ConfusionMatrix, MetricsReport};
pub use xgboost::{XGBNode, XGBoostClassifier, XGBoostConfig};
