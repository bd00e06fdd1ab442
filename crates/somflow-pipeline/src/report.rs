use chrono::{DateTime, Utc};
use serde::Serialize;
use somflow_core::models::PipelineArtifact;
use somflow_raster::models::RasterInfo;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::loader::LayerPlacementPlan;
use crate::state::{Diagnostic, PipelineState, Severity, Stage};

/// Summary of one run, printed by the CLI and saved to the output folder
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workspace: PathBuf,
    pub state: PipelineState,
    pub rasters: Vec<RasterInfo>,
    pub diagnostics: Vec<Diagnostic>,
    /// Artifacts confirmed by a gate, in pipeline order
    pub artifacts: Vec<PipelineArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_plan: Option<LayerPlacementPlan>,
    pub removed: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            workspace: workspace.into(),
            state: PipelineState::Start,
            rasters: Vec::new(),
            diagnostics: Vec::new(),
            artifacts: Vec::new(),
            layer_plan: None,
            removed: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn aborted_at(&self) -> Option<Stage> {
        self.state.aborted_at()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Write the report as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
