//! somflow Raster - Raster metadata, input validation, and the validity mask
//!
//! Raster decoding is delegated to an external collaborator behind the
//! [`ports::RasterBackend`] trait; the bundled adapter drives the GDAL
//! command-line utilities.

pub mod error;
pub mod gdal;
pub mod mask;
pub mod models;
pub mod ports;
pub mod validation;

pub use error::{RasterError, Result};
pub use mask::build_mask;
pub use validation::{validate, ValidationReport};
