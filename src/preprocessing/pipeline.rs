//! Two-branch feature transform
//!
//! Numeric columns: median imputation, then standard scaling.
//! Categorical columns: most-frequent imputation, then one-hot encoding.
//!
//! Every statistic is learned in [`FeaturePreprocessor::fit`] and frozen; the
//! transform applied to a single inference record is exactly the function
//! fitted on the training split.

use crate::error::{Result, RiskError};
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encoder::OneHotEncoder;
use super::imputer::{ImputeStrategy, Imputer};
use super::scaler::StandardScaler;

/// Column-wise preprocessing transform bound ahead of a classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_imputer: Imputer,
    scaler: StandardScaler,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    is_fitted: bool,
}

impl FeaturePreprocessor {
    /// Declare the two column groups. They must be disjoint.
    pub fn new<S: AsRef<str>>(categorical: &[S], numeric: &[S]) -> Result<Self> {
        let categorical_columns: Vec<String> = categorical.iter().map(|s| s.as_ref().to_string()).collect();
        let numeric_columns: Vec<String> = numeric.iter().map(|s| s.as_ref().to_string()).collect();

        if let Some(dup) = categorical_columns.iter().find(|c| numeric_columns.contains(c)) {
            return Err(RiskError::PreprocessingError(format!(
                "column '{}' declared both categorical and numeric",
                dup
            )));
        }

        Ok(Self {
            numeric_columns,
            categorical_columns,
            numeric_imputer: Imputer::new(ImputeStrategy::Median),
            scaler: StandardScaler::new(),
            categorical_imputer: Imputer::new(ImputeStrategy::MostFrequent),
            encoder: OneHotEncoder::new(),
            is_fitted: false,
        })
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        if df.height() == 0 {
            return Err(RiskError::PreprocessingError("cannot fit on an empty frame".to_string()));
        }

        let imputed = self.numeric_imputer.fit_transform(df, &self.numeric_columns)?;
        self.scaler.fit(&imputed, &self.numeric_columns)?;

        let imputed = self.categorical_imputer.fit_transform(df, &self.categorical_columns)?;
        self.encoder.fit(&imputed, &self.categorical_columns)?;

        self.is_fitted = true;
        debug!(
            numeric = self.numeric_columns.len(),
            categorical = self.categorical_columns.len(),
            outputs = self.n_features_out(),
            "Preprocessor fitted"
        );
        Ok(self)
    }

    /// Apply the frozen transform. Output columns follow [`Self::feature_names_out`].
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let numeric = self.scaler.transform(&self.numeric_imputer.transform(df)?)?;
        let numeric = columns_to_array2(&numeric, &self.numeric_columns)?;

        let categorical = self.encoder.transform(&self.categorical_imputer.transform(df)?)?;

        Ok(concatenate(Axis(1), &[numeric.view(), categorical.view()])?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Names of the columns the classifier sees, numeric branch first.
    ///
    /// Each branch reports the names of its last step; the imputers and the
    /// scaler keep their input names, the encoder generates `{col}_{category}`.
    pub fn feature_names_out(&self) -> Vec<String> {
        let numeric = non_empty_or(self.scaler.feature_names_out(), &self.numeric_columns);
        let categorical = if self.encoder.n_outputs() > 0 {
            self.encoder.feature_names_out()
        } else {
            self.categorical_imputer.feature_names_out()
        };
        numeric.into_iter().chain(categorical).collect()
    }

    pub fn n_features_out(&self) -> usize {
        self.numeric_columns.len() + self.encoder.n_outputs()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Save the fitted transform as JSON
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn non_empty_or(names: Vec<String>, fallback: &[String]) -> Vec<String> {
    if names.is_empty() {
        fallback.to_vec()
    } else {
        names
    }
}

/// Extract named columns into a row-major `Array2<f64>`.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
            let values: Vec<f64> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| col_data[c][r]))
}
