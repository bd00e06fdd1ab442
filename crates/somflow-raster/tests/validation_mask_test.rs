//! Integration tests for input validation and the mask builder
//!
//! A recording backend stands in for the GDAL utilities so the tests can
//! check which calls were made.

use async_trait::async_trait;
use somflow_core::models::RasterSet;
use somflow_raster::models::{Extent, RasterInfo, ReferenceKind, SpatialReference};
use somflow_raster::ports::RasterBackend;
use somflow_raster::{build_mask, validate, RasterError, ValidationReport};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingBackend {
    rasters: HashMap<PathBuf, (f64, String)>,
    writes_mask: bool,
    mask_calls: Mutex<Vec<PathBuf>>,
}

impl RecordingBackend {
    fn with_raster(mut self, path: &str, cell: f64, sr: &str) -> Self {
        self.rasters.insert(PathBuf::from(path), (cell, sr.to_string()));
        self
    }

    fn mask_calls(&self) -> Vec<PathBuf> {
        self.mask_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RasterBackend for RecordingBackend {
    async fn describe(&self, path: &Path) -> somflow_raster::Result<RasterInfo> {
        let (cell, sr) = self.rasters.get(path).ok_or_else(|| RasterError::Describe {
            path: path.to_path_buf(),
            reason: "no such raster".to_string(),
        })?;

        Ok(RasterInfo {
            path: path.to_path_buf(),
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            cell_width: *cell,
            cell_height: *cell,
            extent: Extent { xmin: 0.0, ymin: 0.0, xmax: 3000.0, ymax: 3000.0 },
            spatial_reference: SpatialReference {
                name: sr.clone(),
                kind: ReferenceKind::Projected,
                epsg: Some(32633),
            },
        })
    }

    async fn compute_mask(&self, _rasters: &RasterSet, output: &Path) -> somflow_raster::Result<()> {
        self.mask_calls.lock().unwrap().push(output.to_path_buf());
        if self.writes_mask {
            std::fs::write(output, b"mask")?;
        }
        Ok(())
    }
}

/// Validation followed by the mask, the order the pipeline runs them in
async fn validate_then_mask(
    backend: &RecordingBackend,
    rasters: &RasterSet,
    staging: &Path,
) -> Result<Option<PathBuf>, RasterError> {
    match validate(backend, rasters).await? {
        ValidationReport::Consistent { .. } => Ok(Some(build_mask(backend, rasters, staging).await?)),
        ValidationReport::Inconsistent { .. } => Ok(None),
    }
}

#[tokio::test]
async fn test_three_uniform_rasters_build_mask() {
    let temp = TempDir::new().unwrap();
    let backend = RecordingBackend { writes_mask: true, ..Default::default() }
        .with_raster("/d/a.tif", 30.0, "UTM 33N")
        .with_raster("/d/b.tif", 30.0, "UTM 33N")
        .with_raster("/d/c.tif", 30.0, "UTM 33N");
    let rasters = RasterSet::parse("/d/a.tif;/d/b.tif;/d/c.tif").unwrap();

    let mask = validate_then_mask(&backend, &rasters, temp.path()).await.unwrap();

    assert_eq!(mask, Some(temp.path().join("mask")));
    assert_eq!(backend.mask_calls().len(), 1);
}

#[tokio::test]
async fn test_resolution_mismatch_never_builds_mask() {
    let temp = TempDir::new().unwrap();
    let backend = RecordingBackend { writes_mask: true, ..Default::default() }
        .with_raster("/d/a.tif", 30.0, "UTM 33N")
        .with_raster("/d/b.tif", 50.0, "UTM 33N");
    let rasters = RasterSet::parse("/d/a.tif;/d/b.tif").unwrap();

    let report = validate(&backend, &rasters).await.unwrap();
    match &report {
        ValidationReport::Inconsistent { reason, mismatches } => {
            assert!(reason.contains("a.tif"));
            assert_eq!(mismatches.len(), 1);
        }
        other => panic!("expected Inconsistent, got {:?}", other),
    }

    let mask = validate_then_mask(&backend, &rasters, temp.path()).await.unwrap();
    assert_eq!(mask, None);
    assert!(backend.mask_calls().is_empty());
}

#[tokio::test]
async fn test_undescribable_raster_is_an_error() {
    let backend = RecordingBackend::default().with_raster("/d/a.tif", 30.0, "UTM 33N");
    let rasters = RasterSet::parse("/d/a.tif;/d/missing.tif").unwrap();

    let result = validate(&backend, &rasters).await;
    assert!(matches!(result, Err(RasterError::Describe { .. })));
}

#[tokio::test]
async fn test_missing_staging_directory() {
    let temp = TempDir::new().unwrap();
    let backend = RecordingBackend { writes_mask: true, ..Default::default() };
    let rasters = RasterSet::parse("/d/a.tif").unwrap();

    let result = build_mask(&backend, &rasters, &temp.path().join("Temp")).await;

    assert!(matches!(result, Err(RasterError::StagingNotWritable { .. })));
    assert!(backend.mask_calls().is_empty());
}

#[tokio::test]
async fn test_mask_not_written_is_an_error() {
    let temp = TempDir::new().unwrap();
    let backend = RecordingBackend::default();
    let rasters = RasterSet::parse("/d/a.tif").unwrap();

    let result = build_mask(&backend, &rasters, temp.path()).await;

    assert!(matches!(result, Err(RasterError::MaskMissing { ref path }) if path == &temp.path().join("mask")));
    assert_eq!(backend.mask_calls().len(), 1);
}
