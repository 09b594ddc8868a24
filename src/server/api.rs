//! API route definitions

use std::sync::Arc;
use axum::{
    http::{HeaderValue, Method, Uri},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{error::ServerError, handlers, middleware::request_logging, state::AppState};

async fn handle_404(uri: Uri) -> ServerError {
    ServerError::NotFound(format!(
        "{}. Available endpoints: GET /health, POST /predict.",
        uri.path()
    ))
}

async fn handle_405(method: Method, uri: Uri) -> ServerError {
    ServerError::MethodNotAllowed(format!(
        "{} {}. Use GET /health or POST /predict.",
        method,
        uri.path()
    ))
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/predict", post(handlers::predict))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(axum_middleware::from_fn(request_logging));

    // CORS configured via CORS_ORIGIN (default: allow all)
    let cors = match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                tracing::warn!(origin = %origin, "Invalid CORS_ORIGIN, allowing all origins");
                CorsLayer::permissive()
            }
        },
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    app.layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
