//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::RiskError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RiskError> for ServerError {
    fn from(e: RiskError) -> Self {
        ServerError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ServerError::Validation(e.body_text()),
            JsonRejection::JsonSyntaxError(e) => ServerError::Validation(e.body_text()),
            other => ServerError::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ServerError::Internal(msg) => tracing::error!(detail = %msg, "Internal server error"),
            ServerError::ServiceUnavailable(msg) => tracing::warn!(detail = %msg, "Service unavailable"),
            _ => {}
        }

        let message = match &self {
            ServerError::ServiceUnavailable(msg) | ServerError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_envelope() {
        let response = ServerError::ServiceUnavailable("Model not loaded".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({"error": true, "message": "Model not loaded"}));
    }

    #[test]
    fn test_routing_statuses() {
        assert_eq!(ServerError::NotFound("/x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::MethodNotAllowed("GET /predict".into()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_library_errors_are_internal() {
        let e: ServerError = RiskError::InferenceError("boom".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("boom"));
    }
}
