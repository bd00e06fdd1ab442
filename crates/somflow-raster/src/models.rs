use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of coordinate system a raster is referenced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    Projected,
    Geographic,
    Unknown,
}

/// Spatial reference as reported by the raster collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    /// Coordinate system name, or the normalized WKT when it has none
    pub name: String,
    pub kind: ReferenceKind,
    pub epsg: Option<u32>,
}

impl SpatialReference {
    pub fn unknown() -> Self {
        Self { name: "Unknown".to_string(), kind: ReferenceKind::Unknown, epsg: None }
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "{} (EPSG:{})", self.name, code),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Bounding rectangle in map units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

/// Metadata of one input raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub path: PathBuf,
    pub name: String,
    pub cell_width: f64,
    pub cell_height: f64,
    pub extent: Extent,
    pub spatial_reference: SpatialReference,
}

impl RasterInfo {
    pub fn same_resolution(&self, other: &RasterInfo) -> bool {
        self.cell_width == other.cell_width && self.cell_height == other.cell_height
    }

    /// Names must match, and so must the EPSG codes when both carry one
    pub fn same_reference(&self, other: &RasterInfo) -> bool {
        let (a, b) = (&self.spatial_reference, &other.spatial_reference);
        let codes_agree = match (a.epsg, b.epsg) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        };
        a.name == b.name && codes_agree
    }
}
