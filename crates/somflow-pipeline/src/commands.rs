//! Command lines of the three external stages

use somflow_core::config::ToolPaths;
use somflow_core::models::{RunRequest, WorkspaceLayout};

use crate::process::StageCommand;

/// `lrn_tool <root> <SOM.lrn> <mask> <raster>...`
pub fn training_set_command(
    tools: &ToolPaths,
    layout: &WorkspaceLayout,
    request: &RunRequest,
) -> StageCommand {
    StageCommand::new(&tools.lrn_tool)
        .arg(layout.root.display())
        .arg(layout.training_set().display())
        .arg(layout.mask().display())
        .args(request.rasters.iter().map(|p| p.display()))
}

/// `train_tool --xmlfile=<SOM.xml>`
pub fn training_command(tools: &ToolPaths, layout: &WorkspaceLayout) -> StageCommand {
    StageCommand::new(&tools.train_tool)
        .arg(format!("--xmlfile={}", layout.config_document().display()))
}

/// Result-raster generation over both text exports
pub fn result_command(
    tools: &ToolPaths,
    layout: &WorkspaceLayout,
    request: &RunRequest,
) -> StageCommand {
    StageCommand::new(&tools.result_tool)
        .arg(layout.root.display())
        .arg(layout.geo_space.display())
        .arg(layout.som_space.display())
        .arg(layout.mask().display())
        .arg(layout.geospace_export().display())
        .arg(layout.geo_cluster().display())
        .arg(layout.somspace_export().display())
        .arg(layout.som_cluster().display())
        .arg(request.parameters.grid_width)
        .arg(request.parameters.grid_height)
        .arg(request.rasters.len())
}
