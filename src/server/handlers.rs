//! HTTP request handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::explainability::try_explain;
use crate::inference::FittedPipeline;

use super::error::{Result, ServerError};
use super::schemas::{HealthResponse, PredictionRequest, PredictionResponse};
use super::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.is_ready() { "healthy" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        version: state.settings.version.clone(),
    })
}

/// Score one record and attach its explanation
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(request) = payload?;

    let pipeline = state
        .pipeline
        .clone()
        .ok_or_else(|| ServerError::ServiceUnavailable("Model not loaded".to_string()))?;

    let record = request.to_frame()?;
    let prediction = pipeline.predict_one(&record)?;
    debug!(probability = prediction.probability, label = prediction.label, "Record scored");

    let (shap_values, top_features) = if state.settings.explain_predictions {
        let timeout = Duration::from_millis(state.settings.explanation_timeout_ms);
        let (values, top) = explain_within(pipeline, record, timeout, state.settings.top_features).await;
        (Some(values), Some(top))
    } else {
        (None, None)
    };

    Ok(Json(PredictionResponse {
        default_probability: prediction.probability,
        is_default: prediction.label,
        shap_values,
        top_features,
    }))
}

/// Run the explanation off the async executor, bounded by `timeout`.
///
/// Failure, panic or timeout all degrade to an empty explanation.
async fn explain_within(
    pipeline: Arc<FittedPipeline>,
    record: DataFrame,
    timeout: Duration,
    top_k: usize,
) -> (HashMap<String, f64>, Vec<String>) {
    let task = tokio::task::spawn_blocking(move || try_explain(&pipeline, &record));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Some(explanation))) => (explanation.values_map(), explanation.top_features(top_k)),
        Ok(Ok(None)) => (HashMap::new(), Vec::new()),
        Ok(Err(e)) => {
            warn!(error = %e, "Explanation task failed");
            (HashMap::new(), Vec::new())
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Explanation timed out");
            (HashMap::new(), Vec::new())
        }
    }
}
