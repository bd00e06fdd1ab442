use serde::Serialize;
use somflow_pipeline::Diagnostic;
use somflow_raster::models::RasterInfo;
use tabled::Tabled;

/// Output for init command
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub workspace_path: String,
    pub directories: Vec<String>,
}

/// Output for check command
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub tools: Vec<ToolEntry>,
    pub environment: somflow_core::environment::EnvironmentStatus,
}

#[derive(Debug, Serialize, Tabled)]
pub struct ToolEntry {
    #[tabled(rename = "Tool")]
    pub name: String,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Found")]
    pub found: bool,
}

/// One row of `somflow config`
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

/// Input raster metadata row
#[derive(Debug, Serialize, Tabled)]
pub struct RasterRow {
    #[tabled(rename = "Raster")]
    pub name: String,
    #[tabled(rename = "Cell size")]
    pub cell_size: String,
    #[tabled(rename = "Spatial reference")]
    pub spatial_reference: String,
    #[tabled(rename = "Extent")]
    pub extent: String,
}

impl From<&RasterInfo> for RasterRow {
    fn from(info: &RasterInfo) -> Self {
        Self {
            name: info.name.clone(),
            cell_size: format!("{} x {}", info.cell_width, info.cell_height),
            spatial_reference: info.spatial_reference.to_string(),
            extent: info.extent.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct DiagnosticRow {
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Message")]
    pub message: String,
}

impl From<&Diagnostic> for DiagnosticRow {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            stage: diagnostic.stage.to_string(),
            severity: format!("{:?}", diagnostic.severity).to_lowercase(),
            message: diagnostic.message.clone(),
        }
    }
}
