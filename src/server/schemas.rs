//! Request and response bodies

use std::collections::HashMap;

use polars::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::data::FEATURE_COLUMNS;
use crate::error::{Result, RiskError};

/// One credit-card client record, in canonical column names.
///
/// Code and count fields accept whole-number floats such as `2.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub limit_bal: f64,
    #[serde(deserialize_with = "integral")]
    pub sex: i64,
    #[serde(deserialize_with = "integral")]
    pub education: i64,
    #[serde(deserialize_with = "integral")]
    pub marriage: i64,
    #[serde(deserialize_with = "integral")]
    pub age: i64,
    #[serde(deserialize_with = "integral")]
    pub pay_1: i64,
    #[serde(deserialize_with = "integral")]
    pub pay_2: i64,
    #[serde(deserialize_with = "integral")]
    pub pay_3: i64,
    #[serde(deserialize_with = "integral")]
    pub pay_4: i64,
    #[serde(deserialize_with = "integral")]
    pub pay_5: i64,
    #[serde(deserialize_with = "integral")]
    pub pay_6: i64,
    pub bill_amt1: f64,
    pub bill_amt2: f64,
    pub bill_amt3: f64,
    pub bill_amt4: f64,
    pub bill_amt5: f64,
    pub bill_amt6: f64,
    pub pay_amt1: f64,
    pub pay_amt2: f64,
    pub pay_amt3: f64,
    pub pay_amt4: f64,
    pub pay_amt5: f64,
    pub pay_amt6: f64,
}

impl PredictionRequest {
    /// Field values in canonical feature order
    pub fn values(&self) -> [(&'static str, f64); 23] {
        [
            ("limit_bal", self.limit_bal),
            ("sex", self.sex as f64),
            ("education", self.education as f64),
            ("marriage", self.marriage as f64),
            ("age", self.age as f64),
            ("pay_1", self.pay_1 as f64),
            ("pay_2", self.pay_2 as f64),
            ("pay_3", self.pay_3 as f64),
            ("pay_4", self.pay_4 as f64),
            ("pay_5", self.pay_5 as f64),
            ("pay_6", self.pay_6 as f64),
            ("bill_amt1", self.bill_amt1),
            ("bill_amt2", self.bill_amt2),
            ("bill_amt3", self.bill_amt3),
            ("bill_amt4", self.bill_amt4),
            ("bill_amt5", self.bill_amt5),
            ("bill_amt6", self.bill_amt6),
            ("pay_amt1", self.pay_amt1),
            ("pay_amt2", self.pay_amt2),
            ("pay_amt3", self.pay_amt3),
            ("pay_amt4", self.pay_amt4),
            ("pay_amt5", self.pay_amt5),
            ("pay_amt6", self.pay_amt6),
        ]
    }

    /// One-row frame with the same Float64 layout the training data has
    pub fn to_frame(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .values()
            .into_iter()
            .map(|(name, value)| Column::new(name.into(), vec![value]))
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    /// Read the record back from row `row` of a canonical frame
    pub fn from_frame(df: &DataFrame, row: usize) -> Result<Self> {
        let mut record = serde_json::Map::new();
        for name in FEATURE_COLUMNS {
            let value = df
                .column(name)?
                .cast(&DataType::Float64)?
                .f64()?
                .get(row)
                .ok_or_else(|| RiskError::InvalidInput(format!("'{}' is null in row {}", name, row)))?;
            let json = if is_amount(name) {
                serde_json::json!(value)
            } else {
                serde_json::json!(value.round() as i64)
            };
            record.insert(name.to_string(), json);
        }
        Ok(serde_json::from_value(serde_json::Value::Object(record))?)
    }
}

/// Largest magnitude at which every integer is exactly representable as `f64`
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn integral<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER => Ok(value as i64),
        _ => Err(D::Error::custom(format!("expected a whole number, got {}", number))),
    }
}

/// Money-valued fields are `f64`; codes, counts and ages are integers
fn is_amount(name: &str) -> bool {
    name == "limit_bal" || name.starts_with("bill_amt") || name.starts_with("pay_amt")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub default_probability: f64,
    pub is_default: u8,
    /// `None` when explanations are disabled; empty when they degraded
    pub shap_values: Option<HashMap<String, f64>>,
    pub top_features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
