use somflow_core::SomflowError;
use somflow_raster::RasterError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] SomflowError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    // External process errors
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: PathBuf, reason: String },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: PathBuf, timeout: Duration },

    // Layer repository errors
    #[error("Layer repository error: {reason}")]
    Layer { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
