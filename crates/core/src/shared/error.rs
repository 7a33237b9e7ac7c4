use thiserror::Error;

/// Failures the pipeline can observe.
///
/// Only `DeviceUnavailable`, `ImageLoad` and `ThreadStart` are returned to
/// callers (from `start()`); the others are logged by the pipeline and cost
/// one skipped update of the affected output.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no compatible capture device: {0}")]
    DeviceUnavailable(String),
    #[error("face detection failed: {0}")]
    DetectionFailure(String),
    #[error("emotion classification failed: {0}")]
    ClassificationFailure(String),
    #[error("model could not be loaded: {0}")]
    ModelLoadFailure(String),
    #[error("image could not be loaded: {0}")]
    ImageLoad(String),
    #[error("pipeline thread could not start: {0}")]
    ThreadStart(#[from] std::io::Error),
}
