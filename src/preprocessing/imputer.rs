//! Missing value imputation

use crate::error::{Result, RiskError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with median (numeric only)
    Median,
    /// Replace with mode / most frequent value
    MostFrequent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    String(String),
}

/// Imputer for handling missing values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    columns: Vec<String>,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            columns: Vec::new(),
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Learn one fill value per column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.columns = columns.to_vec();
        self.fill_values.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series();

            if series.null_count() == series.len() {
                warn!(column = %col_name, "Column is entirely null, imputing 0");
            }

            let fill_value = self.compute_fill_value(series)?;
            self.fill_values.insert(col_name.clone(), fill_value);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace nulls in every fitted column; other columns pass through
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let column = df
                .column(col_name)
                .map_err(|_| RiskError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series();
            if series.null_count() == 0 {
                continue;
            }

            let fill_value = self
                .fill_values
                .get(col_name)
                .ok_or_else(|| RiskError::FeatureNotFound(col_name.clone()))?;
            let filled = Self::fill_series(series, fill_value)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn fill_value(&self, column: &str) -> Option<&ImputeValue> {
        self.fill_values.get(column)
    }

    /// Imputation never renames or adds columns
    pub fn feature_names_out(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn compute_fill_value(&self, series: &Series) -> Result<ImputeValue> {
        match self.strategy {
            ImputeStrategy::Median => {
                let median = series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .median()
                    .unwrap_or(0.0);
                Ok(ImputeValue::Numeric(median))
            }
            ImputeStrategy::MostFrequent => {
                if series.dtype() == &DataType::String {
                    Ok(ImputeValue::String(Self::mode_string(series)?))
                } else {
                    Ok(ImputeValue::Numeric(Self::mode_numeric(series)?))
                }
            }
        }
    }

    /// Most frequent value; ties resolve to the smallest value
    fn mode_numeric(series: &Series) -> Result<f64> {
        let values = series.cast(&DataType::Float64)?;
        let mut counts: HashMap<u64, usize> = HashMap::new();
        for v in values.f64()?.into_iter().flatten() {
            *counts.entry(v.to_bits()).or_insert(0) += 1;
        }

        let mode = counts
            .into_iter()
            .map(|(bits, count)| (f64::from_bits(bits), count))
            .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
            .map(|(v, _)| v)
            .unwrap_or(0.0);

        Ok(mode)
    }

    fn mode_string(series: &Series) -> Result<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let ca = series.str()?;
        for val in ca.into_iter().flatten() {
            *counts.entry(val).or_insert(0) += 1;
        }

        let mode = counts
            .into_iter()
            .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
            .map(|(v, _)| v.to_string())
            .unwrap_or_default();

        Ok(mode)
    }

    fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
        let name = series.name().clone();
        match fill_value {
            ImputeValue::Numeric(v) => {
                let values: Vec<f64> = series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|x| x.unwrap_or(*v))
                    .collect();
                Ok(Series::new(name, values))
            }
            ImputeValue::String(s) => {
                let values: Vec<String> = series
                    .str()?
                    .into_iter()
                    .map(|x| x.unwrap_or(s.as_str()).to_string())
                    .collect();
                Ok(Series::new(name, values))
            }
        }
    }
}
