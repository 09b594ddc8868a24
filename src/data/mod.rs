//! Data acquisition for the credit-default dataset
//!
//! - [`schema`] canonical columns and source-shape normalization
//! - [`synthetic`] seeded fallback generator
//! - [`loader`] ordered source chain (local spreadsheet, UCI fetch, synthetic)

pub mod loader;
pub mod schema;
pub mod synthetic;

pub use loader::{DataLoader, DataSource};
pub use schema::{
    canonical_columns, normalize, SourceShape, CATEGORICAL_COLUMNS, FEATURE_COLUMNS,
    TARGET_COLUMN,
};
pub use synthetic::SyntheticGenerator;
