//! somflow Core - Domain models, workspace layout, and configuration
//!
//! This crate holds the run request, the SOM configuration document, the
//! workspace manager and the tool configuration shared by the raster,
//! pipeline and CLI crates.

pub mod config;
pub mod environment;
pub mod error;
pub mod models;
pub mod som_xml;
pub mod workspace;

pub use error::{Result, SomflowError};
