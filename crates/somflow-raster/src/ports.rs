use async_trait::async_trait;
use somflow_core::models::RasterSet;
use std::path::Path;

use crate::error::Result;
use crate::models::RasterInfo;

/// Port for the external raster collaborator
#[async_trait]
pub trait RasterBackend: Send + Sync {
    /// Read resolution, extent and spatial reference of a raster
    async fn describe(&self, path: &Path) -> Result<RasterInfo>;

    /// Write a mask raster to `output`: `1` where the cell-wise sum of all
    /// inputs has data, missing elsewhere
    async fn compute_mask(&self, rasters: &RasterSet, output: &Path) -> Result<()>;
}
