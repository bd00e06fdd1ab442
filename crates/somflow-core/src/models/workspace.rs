use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Staging directory holding the mask
pub const STAGING_DIR: &str = "Temp";
pub const GEO_SPACE_DIR: &str = "GeoSpace";
pub const SOM_SPACE_DIR: &str = "SomSpace";
pub const OUTPUT_DIR: &str = "output_folder";

pub const MASK_FILE: &str = "mask";
pub const TRAINING_SET_FILE: &str = "SOM.lrn";
pub const CONFIG_DOCUMENT_FILE: &str = "SOM.xml";
pub const SOMSPACE_EXPORT_FILE: &str = "somspace.txt";
pub const GEOSPACE_EXPORT_FILE: &str = "geospace.txt";
pub const GEO_CLUSTER_FILE: &str = "Geo_cluster";
pub const QUANT_ERROR_FILE: &str = "quant_error";
pub const SOM_CLUSTER_FILE: &str = "SOM_cluster";
pub const UMATRIX_FILE: &str = "umatrix";

pub const LAYER_PLAN_FILE: &str = "layers.json";
pub const RUN_REPORT_FILE: &str = "run_report.json";

/// Directories of a prepared workspace
///
/// Built by [`crate::workspace::ensure_layout`]; every path is derived from
/// `root` and never changes for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLayout {
    /// Workspace root supplied by the caller
    pub root: PathBuf,

    /// Staging directory (mask and other scratch rasters)
    pub staging: PathBuf,

    /// Geo-space result rasters
    pub geo_space: PathBuf,

    /// SOM-space result rasters
    pub som_space: PathBuf,

    /// Output folder named in the SOM configuration document
    pub output: PathBuf,
}

impl WorkspaceLayout {
    /// Derive the layout paths without touching the filesystem
    pub fn at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            staging: root.join(STAGING_DIR),
            geo_space: root.join(GEO_SPACE_DIR),
            som_space: root.join(SOM_SPACE_DIR),
            output: root.join(OUTPUT_DIR),
            root,
        }
    }

    pub fn directories(&self) -> [&Path; 4] {
        [&self.staging, &self.geo_space, &self.som_space, &self.output]
    }

    pub fn mask(&self) -> PathBuf {
        self.staging.join(MASK_FILE)
    }

    pub fn training_set(&self) -> PathBuf {
        self.root.join(TRAINING_SET_FILE)
    }

    pub fn config_document(&self) -> PathBuf {
        self.root.join(CONFIG_DOCUMENT_FILE)
    }

    pub fn somspace_export(&self) -> PathBuf {
        self.root.join(SOMSPACE_EXPORT_FILE)
    }

    pub fn geospace_export(&self) -> PathBuf {
        self.root.join(GEOSPACE_EXPORT_FILE)
    }

    pub fn geo_cluster(&self) -> PathBuf {
        self.geo_space.join(GEO_CLUSTER_FILE)
    }

    pub fn quant_error(&self) -> PathBuf {
        self.geo_space.join(QUANT_ERROR_FILE)
    }

    pub fn som_cluster(&self) -> PathBuf {
        self.som_space.join(SOM_CLUSTER_FILE)
    }

    pub fn umatrix(&self) -> PathBuf {
        self.som_space.join(UMATRIX_FILE)
    }

    pub fn layer_plan(&self) -> PathBuf {
        self.output.join(LAYER_PLAN_FILE)
    }

    pub fn run_report(&self) -> PathBuf {
        self.output.join(RUN_REPORT_FILE)
    }

    /// Intermediate artifacts removed by the cleanup stage
    pub fn intermediates(&self) -> Vec<PathBuf> {
        vec![
            self.staging.clone(),
            self.somspace_export(),
            self.geospace_export(),
            self.training_set(),
            self.config_document(),
        ]
    }
}
