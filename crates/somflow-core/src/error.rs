//! Error types for somflow

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SomflowError {
    // Host errors
    #[error("Application environment error: {reason}")]
    Environment { reason: String },

    #[error("Raster tools version mismatch: requires {required}, found {found}")]
    Version { required: String, found: String },

    // Workspace errors
    #[error("Workspace error at {path}: {reason}")]
    Workspace { path: PathBuf, reason: String },

    // Input errors
    #[error("Input validation failed: {reason}")]
    Validation { reason: String },

    #[error("Invalid value for parameter {key}: {reason}")]
    ParameterInvalid { key: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // SOM configuration document errors
    #[error("Invalid SOM configuration document: element <{element}> {reason}")]
    ConfigDocument { element: String, reason: String },

    #[error("XML error: {0}")]
    Xml(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, SomflowError>;
