//! Data preprocessing
//!
//! Provides the fitted feature transform used by both training and serving:
//! - Missing value imputation (median for numeric, most frequent for categorical)
//! - Standard scaling of numeric columns
//! - One-hot encoding of categorical columns, ignoring unseen categories

mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use encoder::{numeric_key, OneHotEncoder};
pub use imputer::{ImputeStrategy, ImputeValue, Imputer};
pub use pipeline::{columns_to_array2, FeaturePreprocessor};
pub use scaler::{ScalerParams, StandardScaler};
