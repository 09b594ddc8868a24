//! Fitted pipeline artifact: frozen preprocessing bound to a classifier

use crate::error::{Result, RiskError};
use crate::preprocessing::FeaturePreprocessor;
use crate::training::{LogisticRegression, XGBoostClassifier};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Bumped whenever the serialized layout changes incompatibly
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Probability at or above which a record is labelled as a default
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// The classifier stage of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Logistic(LogisticRegression),
    GradientBoosting(XGBoostClassifier),
}

impl Classifier {
    /// Raw log-odds
    pub fn predict_margin(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::Logistic(model) => model.decision_function(x),
            Classifier::GradientBoosting(model) => model.predict_margin(x),
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::Logistic(model) => model.predict_proba(x),
            Classifier::GradientBoosting(model) => model.predict_proba(x),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Classifier::Logistic(_) => "logistic_regression",
            Classifier::GradientBoosting(_) => "gradient_boosting",
        }
    }
}

/// Outcome for a single record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub label: u8,
}

/// Preprocessing transform and classifier, persisted and loaded as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub format_version: u32,
    /// Crate version that produced the artifact
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub threshold: f64,
    preprocessor: FeaturePreprocessor,
    classifier: Classifier,
}

impl FittedPipeline {
    pub fn new(preprocessor: FeaturePreprocessor, classifier: Classifier) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            threshold: DEFAULT_DECISION_THRESHOLD,
            preprocessor,
            classifier,
        }
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Apply the frozen preprocessing transform
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.preprocessor.transform(df)
    }

    pub fn predict_proba(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.transform(df)?;
        self.classifier.predict_proba(&x)
    }

    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let threshold = self.threshold;
        Ok(self
            .predict_proba(df)?
            .mapv(|p| if p >= threshold { 1.0 } else { 0.0 }))
    }

    /// Score a one-row frame
    pub fn predict_one(&self, record: &DataFrame) -> Result<Prediction> {
        if record.height() != 1 {
            return Err(RiskError::InvalidInput(format!(
                "expected exactly one record, got {}",
                record.height()
            )));
        }

        let probability = self.predict_proba(record)?[0];
        if !probability.is_finite() {
            return Err(RiskError::InferenceError("model produced a non-finite probability".to_string()));
        }
        let probability = probability.clamp(0.0, 1.0);

        Ok(Prediction {
            probability,
            label: u8::from(probability >= self.threshold),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), classifier = self.classifier.name(), "Pipeline artifact saved");
        Ok(())
    }

    /// Load an artifact; any read, parse or version problem rejects it whole.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let pipeline: Self = serde_json::from_str(&json)?;

        if pipeline.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(RiskError::SerializationError(format!(
                "unsupported artifact format {} (expected {})",
                pipeline.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if !pipeline.preprocessor.is_fitted() {
            return Err(RiskError::ModelNotFitted);
        }

        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::XGBoostConfig;
    use ndarray::Array1;

    fn frame() -> DataFrame {
        df! {
            "age" => [22.0, 35.0, 47.0, 51.0, 29.0, 63.0],
            "sex" => [1.0, 2.0, 1.0, 2.0, 2.0, 1.0],
        }
        .unwrap()
    }

    fn fitted() -> FittedPipeline {
        let df = frame();
        let mut preprocessor = FeaturePreprocessor::new(&["sex"], &["age"]).unwrap();
        let x = preprocessor.fit_transform(&df).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);

        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            max_depth: 2,
            min_child_weight: 0.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        FittedPipeline::new(preprocessor, Classifier::GradientBoosting(model))
    }

    #[test]
    fn test_predict_one_threshold_rule() {
        let pipeline = fitted();
        let record = df! { "age" => [50.0], "sex" => [3.0] }.unwrap();
        let prediction = pipeline.predict_one(&record).unwrap();

        assert!((0.0..=1.0).contains(&prediction.probability));
        assert_eq!(prediction.label == 1, prediction.probability >= 0.5);
    }

    #[test]
    fn test_predict_one_rejects_multiple_rows() {
        let pipeline = fitted();
        assert!(matches!(pipeline.predict_one(&frame()), Err(RiskError::InvalidInput(_))));
    }

    #[test]
    fn test_save_and_load() {
        let pipeline = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.json");
        pipeline.save(&path).unwrap();

        let loaded = FittedPipeline::load(&path).unwrap();
        assert_eq!(loaded.predict_proba(&frame()).unwrap(), pipeline.predict_proba(&frame()).unwrap());
        assert_eq!(loaded.classifier().name(), "gradient_boosting");
    }

    #[test]
    fn test_load_rejects_garbage_and_future_versions() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not an artifact").unwrap();
        assert!(FittedPipeline::load(&garbage).is_err());

        let mut pipeline = fitted();
        pipeline.format_version = ARTIFACT_FORMAT_VERSION + 1;
        let future = dir.path().join("future.json");
        pipeline.save(&future).unwrap();
        assert!(matches!(FittedPipeline::load(&future), Err(RiskError::SerializationError(_))));

        assert!(FittedPipeline::load(&dir.path().join("missing.json")).is_err());
    }
}
