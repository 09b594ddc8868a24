//! Standard (z-score) feature scaling

use crate::error::{Result, RiskError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    pub std: f64,
}

/// Standardizes columns to zero mean and unit variance: (x - mean) / std
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: HashMap<String, ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.columns = columns.to_vec();
        self.params.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
            let params = Self::compute_params(column.as_materialized_series())?;
            self.params.insert(col_name.clone(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale every fitted column, building replacements first and applying them once.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .map(|col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
                let params = self
                    .params
                    .get(col_name)
                    .ok_or_else(|| RiskError::FeatureNotFound(col_name.clone()))?;
                Self::scale_series(column.as_materialized_series(), params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params.get(column)
    }

    pub fn feature_names_out(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn compute_params(series: &Series) -> Result<ScalerParams> {
        let values: Vec<f64> = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .flatten()
            .collect();

        if values.is_empty() {
            return Ok(ScalerParams { mean: 0.0, std: 1.0 });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        Ok(ScalerParams {
            mean,
            std: if std > f64::EPSILON { std } else { 1.0 },
        })
    }

    fn scale_series(series: &Series, params: &ScalerParams) -> Result<Series> {
        let scaled: Vec<Option<f64>> = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(|x| (x - params.mean) / params.std))
            .collect();
        Ok(Series::new(series.name().clone(), scaled))
    }
}
