//! Per-prediction explanations keyed by transformed feature name

use super::tree_shap::ensemble_shap;
use crate::error::{Result, RiskError};
use crate::inference::{Classifier, FittedPipeline};
use crate::training::LogisticRegression;
use ndarray::{Array1, ArrayView1};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Feature contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature_name: String,
    /// Transformed value the classifier saw
    pub feature_value: f64,
    /// Additive contribution to the log-odds margin
    pub contribution: f64,
}

/// Local explanation for a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Expected margin over the training distribution
    pub base_value: f64,
    pub contributions: Vec<FeatureContribution>,
}

impl Explanation {
    pub fn sum_contributions(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    /// Margin reconstructed from the base value and contributions
    pub fn margin(&self) -> f64 {
        self.base_value + self.sum_contributions()
    }

    pub fn values_map(&self) -> HashMap<String, f64> {
        self.contributions
            .iter()
            .map(|c| (c.feature_name.clone(), c.contribution))
            .collect()
    }

    /// Contributions sorted by absolute value, descending
    pub fn sorted_contributions(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }

    /// Names of the `k` largest contributors by magnitude
    pub fn top_features(&self, k: usize) -> Vec<String> {
        self.sorted_contributions()
            .into_iter()
            .take(k)
            .map(|c| c.feature_name.clone())
            .collect()
    }
}

/// Flat names of the classifier's input columns.
pub fn feature_names(pipeline: &FittedPipeline) -> Vec<String> {
    pipeline.preprocessor().feature_names_out()
}

/// Base value and attributions for one transformed row.
pub fn attributions(classifier: &Classifier, row: &ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
    match classifier {
        Classifier::GradientBoosting(model) => ensemble_shap(model, row),
        Classifier::Logistic(model) => linear_attributions(model, row),
    }
}

/// `coef_j * (x_j - mean_j)` against the training means
fn linear_attributions(model: &LogisticRegression, row: &ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
    let (Some(coefficients), Some(intercept), Some(means)) =
        (&model.coefficients, model.intercept, &model.feature_means)
    else {
        return Err(RiskError::ModelNotFitted);
    };
    if row.len() != coefficients.len() {
        return Err(RiskError::ShapeError {
            expected: format!("{} features", coefficients.len()),
            actual: format!("{} features", row.len()),
        });
    }

    let base_value = intercept + coefficients.dot(means);
    let phi = coefficients * &(row - means);
    Ok((base_value, phi))
}

/// Explain the single record in `record`.
pub fn explain(pipeline: &FittedPipeline, record: &DataFrame) -> Result<Explanation> {
    if record.height() != 1 {
        return Err(RiskError::InvalidInput(format!(
            "expected exactly one record, got {}",
            record.height()
        )));
    }

    let x = pipeline.transform(record)?;
    let row = x.row(0);
    let (base_value, phi) = attributions(pipeline.classifier(), &row)?;

    let names = feature_names(pipeline);
    if names.len() != phi.len() {
        return Err(RiskError::ShapeError {
            expected: format!("{} feature names", phi.len()),
            actual: format!("{} feature names", names.len()),
        });
    }

    let contributions = names
        .into_iter()
        .zip(row.iter().zip(phi.iter()))
        .map(|(feature_name, (&feature_value, &contribution))| FeatureContribution {
            feature_name,
            feature_value,
            contribution,
        })
        .collect();

    Ok(Explanation { base_value, contributions })
}

/// Explain, or log and give up.
pub fn try_explain(pipeline: &FittedPipeline, record: &DataFrame) -> Option<Explanation> {
    match explain(pipeline, record) {
        Ok(explanation) => Some(explanation),
        Err(e) => {
            warn!(error = %e, "Explanation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeaturePreprocessor;
    use crate::training::{XGBoostClassifier, XGBoostConfig};
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df! {
            "age" => [22.0, 35.0, 47.0, 51.0, 29.0, 63.0, 41.0, 33.0],
            "limit_bal" => [5e4, 2e5, 8e4, 1e4, 3e5, 2e4, 1.5e5, 6e4],
            "sex" => [1.0, 2.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0],
        }
        .unwrap()
    }

    fn labels() -> Array1<f64> {
        Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0])
    }

    fn pipeline(classifier: &str) -> FittedPipeline {
        let df = frame();
        let mut preprocessor = FeaturePreprocessor::new(&["sex"], &["age", "limit_bal"]).unwrap();
        let x = preprocessor.fit_transform(&df).unwrap();

        let classifier = if classifier == "logistic" {
            let mut model = LogisticRegression::new();
            model.fit(&x, &labels()).unwrap();
            Classifier::Logistic(model)
        } else {
            let mut model = XGBoostClassifier::new(XGBoostConfig {
                n_estimators: 15,
                max_depth: 3,
                min_child_weight: 0.0,
                ..Default::default()
            });
            model.fit(&x, &labels()).unwrap();
            Classifier::GradientBoosting(model)
        };
        FittedPipeline::new(preprocessor, classifier)
    }

    fn record() -> DataFrame {
        df! { "age" => [45.0], "limit_bal" => [2.5e4], "sex" => [2.0] }.unwrap()
    }

    #[test]
    fn test_feature_names_follow_transform() {
        assert_eq!(feature_names(&pipeline("tree")), vec!["age", "limit_bal", "sex_1", "sex_2"]);
    }

    #[test]
    fn test_tree_explanation_is_additive() {
        let pipeline = pipeline("tree");
        let explanation = explain(&pipeline, &record()).unwrap();
        let x = pipeline.transform(&record()).unwrap();
        let margin = pipeline.classifier().predict_margin(&x).unwrap()[0];

        assert_eq!(explanation.contributions.len(), 4);
        assert!((explanation.margin() - margin).abs() < 1e-6);
    }

    #[test]
    fn test_linear_explanation_is_additive() {
        let pipeline = pipeline("logistic");
        let explanation = explain(&pipeline, &record()).unwrap();
        let x = pipeline.transform(&record()).unwrap();
        let margin = pipeline.classifier().predict_margin(&x).unwrap()[0];

        assert!((explanation.margin() - margin).abs() < 1e-9);
    }

    #[test]
    fn test_top_features_ordering() {
        let explanation = Explanation {
            base_value: 0.0,
            contributions: [("a", 0.1), ("b", -0.7), ("c", 0.4)]
                .iter()
                .map(|(name, c)| FeatureContribution {
                    feature_name: name.to_string(),
                    feature_value: 0.0,
                    contribution: *c,
                })
                .collect(),
        };

        assert_eq!(explanation.top_features(2), vec!["b", "c"]);
        assert_eq!(explanation.top_features(10).len(), 3);
        assert_eq!(explanation.values_map()["b"], -0.7);
    }

    #[test]
    fn test_try_explain_degrades_to_none() {
        let pipeline = pipeline("tree");
        let missing_column = df! { "age" => [45.0] }.unwrap();
        assert!(try_explain(&pipeline, &missing_column).is_none());
    }
}
