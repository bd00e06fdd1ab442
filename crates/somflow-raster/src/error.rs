use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Raster tool {tool} is unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Cannot describe raster {path}: {reason}")]
    Describe { path: PathBuf, reason: String },

    #[error("Mask could not be built: {reason}")]
    Mask { reason: String, exit_code: Option<i32> },

    #[error("Mask {path} was not written")]
    MaskMissing { path: PathBuf },

    #[error("Staging directory {path} is not writable: {reason}")]
    StagingNotWritable { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RasterError>;
