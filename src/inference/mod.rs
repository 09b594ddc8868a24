//! Inference artifact
//!
//! A [`FittedPipeline`] is written once by the training run and loaded once by
//! the serving process; after load it is never mutated.

mod pipeline;

pub use pipeline::{
    Classifier, FittedPipeline, Prediction, ARTIFACT_FORMAT_VERSION, DEFAULT_DECISION_THRESHOLD,
};
