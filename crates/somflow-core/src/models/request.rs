use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SomflowError};
use crate::models::som::SomParameters;

/// Ordered set of input rasters
///
/// All members must share cell resolution and spatial reference; the first
/// raster is the baseline every other raster is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathBuf>")]
pub struct RasterSet(Vec<PathBuf>);

impl TryFrom<Vec<PathBuf>> for RasterSet {
    type Error = SomflowError;

    fn try_from(paths: Vec<PathBuf>) -> Result<Self> {
        Self::from_paths(paths)
    }
}

impl RasterSet {
    /// Parse a `;`-joined raster list, skipping empty entries
    pub fn parse(list: &str) -> Result<Self> {
        let paths = list
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        Self::from_paths(paths)
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(SomflowError::Validation {
                reason: "no input rasters were given".to_string(),
            });
        }
        Ok(Self(paths))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Caller input for one run, built once and passed to every stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub workspace_root: PathBuf,
    pub rasters: RasterSet,
    pub parameters: SomParameters,
    pub delete_intermediates: bool,
}

impl RunRequest {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        rasters: RasterSet,
        parameters: SomParameters,
        delete_intermediates: bool,
    ) -> Result<Self> {
        parameters.validate()?;
        Ok(Self {
            workspace_root: workspace_root.into(),
            rasters,
            parameters,
            delete_intermediates,
        })
    }
}
