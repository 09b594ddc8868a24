//! Error types for the credit risk service

use thiserror::Error;

/// Result type alias for credit risk operations
pub type Result<T> = std::result::Result<T, RiskError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<polars::error::PolarsError> for RiskError {
    fn from(err: polars::error::PolarsError) -> Self {
        RiskError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        RiskError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RiskError {
    fn from(err: ndarray::ShapeError) -> Self {
        RiskError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<calamine::Error> for RiskError {
    fn from(err: calamine::Error) -> Self {
        RiskError::DataError(format!("spreadsheet: {}", err))
    }
}

impl From<reqwest::Error> for RiskError {
    fn from(err: reqwest::Error) -> Self {
        RiskError::HttpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RiskError::DataError("missing column".to_string());
        assert_eq!(err.to_string(), "Data error: missing column");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RiskError = io_err.into();
        assert!(matches!(err, RiskError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: RiskError = json_err.into();
        assert!(matches!(err, RiskError::SerializationError(_)));
    }
}
