//! Risk scoring HTTP service
//!
//! Serves `GET /health` and `POST /predict` from a pipeline artifact loaded
//! once at startup. A missing or unreadable artifact leaves the service up in
//! degraded mode, answering predictions with 503.

mod api;
mod error;
mod handlers;
mod middleware;
mod schemas;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use middleware::REQUEST_ID_HEADER;
pub use schemas::{HealthResponse, PredictionRequest, PredictionResponse};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Load the model and serve until ctrl+c
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let config = ServerConfig::from_settings(&settings);

    let state = Arc::new(AppState::load_from(settings));
    if !state.is_ready() {
        warn!("No model loaded; /predict will answer 503 until a model is trained and the service restarted");
    }
    let app = create_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        project = %state.settings.project_name,
        version = %state.settings.version,
        address = %addr,
        started_at = %start_time.to_rfc3339(),
        "Risk scoring service starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
