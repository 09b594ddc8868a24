//! One-hot encoding with a frozen vocabulary

use crate::error::{Result, RiskError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One-hot encoder. Categories unseen during fit encode to all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// (column, sorted categories) in declared column order
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.categories.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
            let vocabulary = Self::build_vocabulary(column.as_materialized_series())?;
            self.categories.push((col_name.clone(), vocabulary));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Dense one-hot block, one row per input row.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.n_outputs()));
        let mut offset = 0;

        for (col_name, vocabulary) in &self.categories {
            let column = df
                .column(col_name)
                .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
            let keys = category_keys(column.as_materialized_series())?;

            for (row, key) in keys.iter().enumerate() {
                if let Some(pos) = key
                    .as_deref()
                    .and_then(|k| vocabulary.iter().position(|c| c == k))
                {
                    out[[row, offset + pos]] = 1.0;
                }
            }
            offset += vocabulary.len();
        }

        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Generated names, `{column}_{category}`
    pub fn feature_names_out(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|(col, vocab)| vocab.iter().map(move |cat| format!("{}_{}", col, cat)))
            .collect()
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_slice())
    }

    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(|(_, v)| v.len()).sum()
    }

    fn build_vocabulary(series: &Series) -> Result<Vec<String>> {
        if series.dtype() == &DataType::String {
            let mut vocab: Vec<String> = series
                .str()?
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect();
            vocab.sort();
            vocab.dedup();
            return Ok(vocab);
        }

        let mut values: Vec<f64> = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .flatten()
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        Ok(values.into_iter().map(numeric_key).collect())
    }
}

/// Category label for a numeric code: whole numbers render without a fraction
pub fn numeric_key(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn category_keys(series: &Series) -> Result<Vec<Option<String>>> {
    if series.dtype() == &DataType::String {
        return Ok(series
            .str()?
            .into_iter()
            .map(|s| s.map(|s| s.to_string()))
            .collect());
    }

    Ok(series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.map(numeric_key))
        .collect())
}
