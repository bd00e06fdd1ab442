use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::workspace::WorkspaceLayout;

/// Files and directories exchanged between pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Mask,
    TrainingSet,
    GeoSpaceExport,
    SomSpaceExport,
    GeoCluster,
    QuantError,
    SomCluster,
    UMatrix,
}

impl ArtifactKind {
    /// Result rasters that must all exist for a complete run
    pub const RESULTS: [ArtifactKind; 4] = [
        ArtifactKind::GeoCluster,
        ArtifactKind::QuantError,
        ArtifactKind::SomCluster,
        ArtifactKind::UMatrix,
    ];

    pub fn path(&self, layout: &WorkspaceLayout) -> PathBuf {
        match self {
            ArtifactKind::Mask => layout.mask(),
            ArtifactKind::TrainingSet => layout.training_set(),
            ArtifactKind::GeoSpaceExport => layout.geospace_export(),
            ArtifactKind::SomSpaceExport => layout.somspace_export(),
            ArtifactKind::GeoCluster => layout.geo_cluster(),
            ArtifactKind::QuantError => layout.quant_error(),
            ArtifactKind::SomCluster => layout.som_cluster(),
            ArtifactKind::UMatrix => layout.umatrix(),
        }
    }

    /// Resolve against a layout
    pub fn locate(&self, layout: &WorkspaceLayout) -> PipelineArtifact {
        PipelineArtifact { kind: *self, path: self.path(layout) }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Mask => "mask",
            ArtifactKind::TrainingSet => "SOM.lrn",
            ArtifactKind::GeoSpaceExport => "geospace.txt",
            ArtifactKind::SomSpaceExport => "somspace.txt",
            ArtifactKind::GeoCluster => "Geo_cluster",
            ArtifactKind::QuantError => "quant_error",
            ArtifactKind::SomCluster => "SOM_cluster",
            ArtifactKind::UMatrix => "umatrix",
        };
        f.write_str(name)
    }
}

/// An artifact resolved to its location in the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl PipelineArtifact {
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
