//! Training orchestration: split, fit baseline and champion, evaluate, persist

use crate::config::Settings;
use crate::data::{DataLoader, CATEGORICAL_COLUMNS, FEATURE_COLUMNS, TARGET_COLUMN};
use crate::error::{Result, RiskError};
use crate::inference::{Classifier, FittedPipeline, DEFAULT_DECISION_THRESHOLD};
use crate::preprocessing::FeaturePreprocessor;
use ndarray::Array1;
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use super::linear_models::LogisticRegression;
use super::metrics::{ClassificationMetrics, MetricsReport};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};

/// Training run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    pub random_state: u64,
    pub baseline_max_iter: usize,
    pub champion: XGBoostConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            baseline_max_iter: 1000,
            champion: XGBoostConfig {
                n_estimators: 100,
                max_depth: 6,
                learning_rate: 0.1,
                random_state: Some(42),
                ..Default::default()
            },
        }
    }
}

impl TrainingConfig {
    /// Defaults with the split and champion seeded from `RANDOM_SEED`
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            random_state: settings.random_seed,
            champion: XGBoostConfig {
                random_state: Some(settings.random_seed),
                ..defaults.champion
            },
            ..defaults
        }
    }
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub report: MetricsReport,
    pub baseline: ClassificationMetrics,
    pub champion: ClassificationMetrics,
    /// Served champion pipeline
    pub pipeline: FittedPipeline,
    /// Logistic baseline over the same fitted preprocessor
    pub baseline_pipeline: FittedPipeline,
    pub n_train: usize,
    pub n_test: usize,
    pub training_time_secs: f64,
}

/// Fits the baseline and champion pipelines on a canonical frame
#[derive(Debug, Clone, Default)]
pub struct TrainingOrchestrator {
    config: TrainingConfig,
}

impl TrainingOrchestrator {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load data through the source chain, fit, then write report and artifacts.
    pub async fn run(&self, settings: &Settings) -> Result<TrainingOutcome> {
        info!("Loading data");
        let df = DataLoader::from_settings(settings).load().await?;

        let outcome = self.fit(&df)?;
        self.persist(&outcome, settings)?;
        Ok(outcome)
    }

    /// Fit both pipelines on a stratified split and score them on the held-out rows.
    pub fn fit(&self, df: &DataFrame) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let features: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
        let (categorical, numeric) = split_columns_by_type(df, &features)?;
        info!(categorical = ?categorical, numeric = numeric.len(), "Feature groups");

        let y_all = target_vector(df)?;
        let (train_idx, test_idx) =
            stratified_split(&y_all, self.config.test_size, self.config.random_state)?;
        let train = take_rows(df, &train_idx)?;
        let test = take_rows(df, &test_idx)?;
        let y_train = target_vector(&train)?;
        let y_test = target_vector(&test)?;
        info!(train_rows = train.height(), test_rows = test.height(), "Stratified split");

        let mut preprocessor = FeaturePreprocessor::new(&categorical, &numeric)?;
        let x_train = preprocessor.fit_transform(&train)?;
        let x_test = preprocessor.transform(&test)?;

        info!("Training baseline model (logistic regression)");
        let mut baseline = LogisticRegression::new().with_max_iter(self.config.baseline_max_iter);
        baseline.fit(&x_train, &y_train)?;
        let baseline_metrics = ClassificationMetrics::compute(
            &y_test,
            &baseline.predict_proba(&x_test)?,
            DEFAULT_DECISION_THRESHOLD,
        )?;
        info!(
            accuracy = baseline_metrics.accuracy,
            roc_auc = baseline_metrics.roc_auc,
            "Baseline evaluated"
        );

        info!(
            n_estimators = self.config.champion.n_estimators,
            max_depth = self.config.champion.max_depth,
            learning_rate = self.config.champion.learning_rate,
            "Training champion model (gradient boosting)"
        );
        let mut champion = XGBoostClassifier::new(self.config.champion.clone());
        champion.fit(&x_train, &y_train)?;
        let champion_metrics = ClassificationMetrics::compute(
            &y_test,
            &champion.predict_proba(&x_test)?,
            DEFAULT_DECISION_THRESHOLD,
        )?;
        info!(
            accuracy = champion_metrics.accuracy,
            roc_auc = champion_metrics.roc_auc,
            precision = champion_metrics.precision,
            recall = champion_metrics.recall,
            f1 = champion_metrics.f1,
            "Champion evaluated"
        );

        let report = MetricsReport::new(&baseline_metrics, &champion_metrics);
        let baseline_pipeline = FittedPipeline::new(preprocessor.clone(), Classifier::Logistic(baseline));
        let pipeline = FittedPipeline::new(preprocessor, Classifier::GradientBoosting(champion));

        Ok(TrainingOutcome {
            report,
            baseline: baseline_metrics,
            champion: champion_metrics,
            pipeline,
            baseline_pipeline,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            training_time_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Write the metrics report, the champion artifact and the bare preprocessor.
    pub fn persist(&self, outcome: &TrainingOutcome, settings: &Settings) -> Result<()> {
        let metrics_path = settings.metrics_path();
        outcome.report.save(&metrics_path)?;
        info!(path = %metrics_path.display(), "Metrics report written");

        outcome.pipeline.save(&settings.model_path)?;
        outcome.baseline_pipeline.save(&settings.baseline_model_path)?;

        if let Some(parent) = settings.preprocessor_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        outcome.pipeline.preprocessor().save(&settings.preprocessor_path)?;
        info!(path = %settings.preprocessor_path.display(), "Preprocessor saved");
        Ok(())
    }
}

/// Partition feature columns into (categorical, numeric).
///
/// A column is categorical when it is one of the declared code columns or
/// holds strings; any other numeric column is numeric.
pub fn split_columns_by_type(
    df: &DataFrame,
    features: &[String],
) -> Result<(Vec<String>, Vec<String>)> {
    let mut categorical = Vec::new();
    let mut numeric = Vec::new();

    for name in features {
        let column = df
            .column(name)
            .map_err(|_| RiskError::FeatureNotFound(name.clone()))?;
        let dtype = column.dtype();
        if CATEGORICAL_COLUMNS.contains(&name.as_str()) || matches!(dtype, DataType::String) {
            categorical.push(name.clone());
        } else if matches!(
            dtype,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
            DataType::Float32 | DataType::Float64
        ) {
            numeric.push(name.clone());
        } else {
            return Err(RiskError::DataError(format!(
                "column '{}' has unsupported type {}",
                name, dtype
            )));
        }
    }

    Ok((categorical, numeric))
}

/// Per-class shuffled split, holding out `test_size` of every class.
///
/// Fails on a single-class target or a class too small to appear on both sides.
pub fn stratified_split(y: &Array1<f64>, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(RiskError::TrainingError(format!("test_size must be in (0, 1), got {}", test_size)));
    }

    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label.round() as i64).or_default().push(i);
    }

    if by_class.len() < 2 {
        return Err(RiskError::TrainingError(format!(
            "stratified split needs at least two classes, found {}",
            by_class.len()
        )));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for (label, mut indices) in by_class {
        if indices.len() < 2 {
            return Err(RiskError::TrainingError(format!(
                "class {} has {} member(s); at least 2 are required",
                label,
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * test_size).round().clamp(1.0, (indices.len() - 1) as f64) as usize;
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Binary target as 0.0 / 1.0
fn target_vector(df: &DataFrame) -> Result<Array1<f64>> {
    let target = df
        .column(TARGET_COLUMN)
        .map_err(|_| RiskError::FeatureNotFound(TARGET_COLUMN.to_string()))?
        .cast(&DataType::Float64)?;

    target
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(v) if v == 0.0 || v == 1.0 => Ok(v),
            other => Err(RiskError::DataError(format!("target must be 0 or 1, got {:?}", other))),
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}
