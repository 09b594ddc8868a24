//! Credit-default risk scoring
//!
//! Trains a gradient-boosted classifier on the UCI "default of credit card
//! clients" dataset, persists the fitted pipeline, and serves per-record
//! default probabilities with additive feature attributions.
//!
//! # Modules
//!
//! - [`data`] - Source chain (local export, UCI fetch, synthetic) and schema normalization
//! - [`preprocessing`] - Imputation, scaling and one-hot encoding
//! - [`training`] - Logistic baseline, boosted-tree champion, metrics, orchestration
//! - [`inference`] - The versioned pipeline artifact
//! - [`explainability`] - TreeSHAP and linear attributions
//! - [`server`] - HTTP service
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod inference;
pub mod explainability;

pub mod server;
pub mod cli;

pub use error::{Result, RiskError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::data::{DataLoader, DataSource, SourceShape, SyntheticGenerator};
    pub use crate::error::{Result, RiskError};
    pub use crate::explainability::{explain, Explanation};
    pub use crate::inference::{Classifier, FittedPipeline, Prediction};
    pub use crate::preprocessing::FeaturePreprocessor;
    pub use crate::server::{create_router, AppState};
    pub use crate::training::{MetricsReport, TrainingConfig, TrainingOrchestrator};
}
