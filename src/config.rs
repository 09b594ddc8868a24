//! Service configuration
//!
//! Every setting is optional and overridable from the environment (or a `.env`
//! file in the working directory).

use std::path::PathBuf;

/// Runtime settings shared by the training job, the loader and the server.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_name: String,
    pub version: String,
    pub model_path: PathBuf,
    /// Logistic baseline artifact, written alongside the champion
    pub baseline_model_path: PathBuf,
    pub preprocessor_path: PathBuf,
    pub processed_data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub aws_region: String,

    /// Skip the local file and remote fetch entirely
    pub use_synthetic_data: bool,
    pub local_data_path: PathBuf,
    pub uci_api_url: String,
    pub uci_dataset_id: u32,
    pub remote_timeout_secs: u64,
    pub synthetic_rows: usize,
    pub random_seed: u64,

    pub host: String,
    pub port: u16,
    pub explain_predictions: bool,
    pub explanation_timeout_ms: u64,
    pub top_features: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

impl Settings {
    /// Load settings from the process environment, reading `.env` first.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let path = |key: &str, default: &str| PathBuf::from(string(key, default));
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(default)
        };

        Self {
            project_name: string("PROJECT_NAME", "AWS ML Risk Scoring Service"),
            version: string("VERSION", env!("CARGO_PKG_VERSION")),
            model_path: path("MODEL_PATH", "models/model.json"),
            baseline_model_path: path("BASELINE_MODEL_PATH", "models/baseline.json"),
            preprocessor_path: path("PREPROCESSOR_PATH", "models/preprocessor.json"),
            processed_data_dir: path("PROCESSED_DATA_DIR", "data/processed"),
            reports_dir: path("REPORTS_DIR", "reports"),
            aws_region: string("AWS_REGION", "us-east-1"),
            use_synthetic_data: flag("USE_SYNTHETIC_DATA", false),
            local_data_path: path(
                "LOCAL_DATA_PATH",
                "data/raw/default_of_credit_card_clients.csv",
            ),
            uci_api_url: string("UCI_API_URL", "https://archive.ics.uci.edu/api/dataset"),
            uci_dataset_id: parse_or(lookup("UCI_DATASET_ID"), 350),
            remote_timeout_secs: parse_or(lookup("REMOTE_TIMEOUT_SECS"), 30),
            synthetic_rows: parse_or(lookup("SYNTHETIC_ROWS"), 1000),
            random_seed: parse_or(lookup("RANDOM_SEED"), 42),
            host: string("API_HOST", "0.0.0.0"),
            port: parse_or(lookup("API_PORT"), 8000),
            explain_predictions: flag("EXPLAIN_PREDICTIONS", true),
            explanation_timeout_ms: parse_or(lookup("EXPLANATION_TIMEOUT_MS"), 2000),
            top_features: parse_or(lookup("TOP_FEATURES"), 5),
        }
    }

    /// Location of the metrics report written by each training run
    pub fn metrics_path(&self) -> PathBuf {
        self.reports_dir.join("metrics.json")
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.project_name, "AWS ML Risk Scoring Service");
        assert_eq!(settings.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(settings.aws_region, "us-east-1");
        assert_eq!(settings.uci_dataset_id, 350);
        assert_eq!(settings.synthetic_rows, 1000);
        assert_eq!(settings.random_seed, 42);
        assert!(!settings.use_synthetic_data);
        assert!(settings.explain_predictions);
        assert_eq!(settings.baseline_model_path, PathBuf::from("models/baseline.json"));
        assert_eq!(settings.metrics_path(), PathBuf::from("reports/metrics.json"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("USE_SYNTHETIC_DATA", "TRUE"),
            ("MODEL_PATH", "/tmp/m.json"),
            ("API_PORT", "9090"),
            ("TOP_FEATURES", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_source(|k| env.get(k).map(|v| v.to_string()));
        assert!(settings.use_synthetic_data);
        assert_eq!(settings.model_path, PathBuf::from("/tmp/m.json"));
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.top_features, 5);
    }
}
