//! Application state management

use std::sync::Arc;
use tracing::{error, info};

use crate::config::Settings;
use crate::inference::FittedPipeline;

/// Application state shared across handlers
///
/// The pipeline is loaded once at startup and only read afterwards.
pub struct AppState {
    pub settings: Settings,
    pub pipeline: Option<Arc<FittedPipeline>>,
}

impl AppState {
    /// State with no model loaded
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            pipeline: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: FittedPipeline) -> Self {
        self.pipeline = Some(Arc::new(pipeline));
        self
    }

    /// Try to load the artifact at `settings.model_path`; stay degraded on failure.
    pub fn load_from(settings: Settings) -> Self {
        let path = settings.model_path.clone();
        let state = Self::new(settings);
        match FittedPipeline::load(&path) {
            Ok(pipeline) => {
                info!(
                    path = %path.display(),
                    classifier = pipeline.classifier().name(),
                    model_version = %pipeline.model_version,
                    "Model loaded"
                );
                state.with_pipeline(pipeline)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load model, serving in degraded mode");
                state
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }
}
