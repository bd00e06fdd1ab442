use serde::Serialize;
use somflow_core::models::RasterSet;

use crate::error::Result;
use crate::models::RasterInfo;
use crate::ports::RasterBackend;

/// Outcome of the uniformity check over a raster set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationReport {
    Consistent { rasters: Vec<RasterInfo> },
    Inconsistent { reason: String, mismatches: Vec<Mismatch> },
}

/// One raster that differs from the baseline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub raster: String,
    pub property: MismatchProperty,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchProperty {
    Resolution,
    SpatialReference,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        matches!(self, ValidationReport::Consistent { .. })
    }
}

/// Describe every raster and check it against the first one
pub async fn validate<B>(backend: &B, rasters: &RasterSet) -> Result<ValidationReport>
where
    B: RasterBackend + ?Sized,
{
    let mut infos = Vec::with_capacity(rasters.len());
    for path in rasters.iter() {
        let info = backend.describe(path).await?;
        tracing::info!(
            raster = %info.name,
            cell_width = info.cell_width,
            cell_height = info.cell_height,
            extent = %info.extent,
            spatial_reference = %info.spatial_reference,
            kind = ?info.spatial_reference.kind,
            "Input raster"
        );
        infos.push(info);
    }

    Ok(check_uniformity(infos))
}

/// Compare resolution and spatial reference of all rasters with the first
pub fn check_uniformity(rasters: Vec<RasterInfo>) -> ValidationReport {
    let Some(baseline) = rasters.first() else {
        return ValidationReport::Consistent { rasters };
    };

    let mut mismatches = Vec::new();
    for info in &rasters[1..] {
        if !info.same_resolution(baseline) {
            mismatches.push(Mismatch {
                raster: info.name.clone(),
                property: MismatchProperty::Resolution,
                expected: format!("{} x {}", baseline.cell_width, baseline.cell_height),
                found: format!("{} x {}", info.cell_width, info.cell_height),
            });
        }
        if !info.same_reference(baseline) {
            mismatches.push(Mismatch {
                raster: info.name.clone(),
                property: MismatchProperty::SpatialReference,
                expected: baseline.spatial_reference.name.clone(),
                found: info.spatial_reference.name.clone(),
            });
        }
    }

    if mismatches.is_empty() {
        return ValidationReport::Consistent { rasters };
    }

    let mut problems = Vec::new();
    if mismatches.iter().any(|m| m.property == MismatchProperty::Resolution) {
        problems.push("the same resolution");
    }
    if mismatches.iter().any(|m| m.property == MismatchProperty::SpatialReference) {
        problems.push("the same spatial reference");
    }
    let reason = format!(
        "All input rasters must have {} as {}",
        problems.join(" and "),
        baseline.name
    );

    ValidationReport::Inconsistent { reason, mismatches }
}
