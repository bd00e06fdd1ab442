//! Run command implementation

use crate::cli::RunArgs;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::errors::{inconsistent_rasters, CliError};
use crate::output::OutputWriter;
use crate::output_types::{DiagnosticRow, RasterRow};
use crate::progress::StageSpinners;
use anyhow::{Context, Result};
use somflow_core::config::{LayeredConfig, ToolPaths};
use somflow_core::environment::check_environment;
use somflow_core::models::{RunRequest, SomConfiguration, WorkspaceLayout};
use somflow_pipeline::commands::{result_command, training_command, training_set_command};
use somflow_pipeline::{
    DiagnosticKind, ManifestRepository, PipelineController, PipelineState, RunReport, Stage,
    TokioProcessRunner,
};
use somflow_raster::gdal::{mask_arguments, GdalCli};
use tokio_util::sync::CancellationToken;

pub async fn execute(
    args: RunArgs,
    config: &LayeredConfig,
    output: &OutputWriter,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = args.to_request()?;
    let tools = config.tools();
    let layout = WorkspaceLayout::at(&request.workspace_root);

    if dry_run {
        let actions = plan(&request, &layout, &tools)?;
        display_planned_actions(output, &actions)?;
        return Ok(());
    }

    let gdal_version = check_environment(&tools).await.into_result()?;
    tracing::info!(gdal = %gdal_version, "Environment check passed");

    let raster = GdalCli::new(&tools.gdalinfo, &tools.gdal_calc).with_timeout(tools.process_timeout);
    let runner = TokioProcessRunner::new(tools.process_timeout);
    let layers = ManifestRepository::new(layout.layer_plan());
    let controller = PipelineController::new(raster, runner, layers, tools);

    let mut spinners = (!output.is_json()).then(StageSpinners::new);
    let report = controller
        .run_with_progress(&request, cancel, |progress| {
            if let Some(spinners) = spinners.as_mut() {
                spinners.advance(progress);
            }
        })
        .await
        .context("SOM workflow failed")?;
    if let Some(spinners) = spinners.as_mut() {
        spinners.finish(&report);
    }

    print_report(&report, &layout, output)?;

    if report.aborted_at() == Some(Stage::Validation) {
        let reason = report
            .diagnostics
            .iter()
            .find(|d| d.stage == Stage::Validation)
            .map(|d| d.message.as_str())
            .unwrap_or("input rasters are inconsistent");
        return Err(inconsistent_rasters(reason).into());
    }
    if report.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Cancelled) {
        return Err(CliError::new("Run cancelled")
            .with_context(format!("Partial results are kept in {}", layout.root.display()))
            .into());
    }

    Ok(())
}

fn print_report(report: &RunReport, layout: &WorkspaceLayout, output: &OutputWriter) -> Result<()> {
    if output.is_json() {
        return output.result(report);
    }

    if !report.rasters.is_empty() {
        output.section("Input Rasters");
        output.table(report.rasters.iter().map(RasterRow::from).collect::<Vec<_>>());
    }

    if !report.artifacts.is_empty() {
        output.section("Artifacts");
        for artifact in &report.artifacts {
            output.success(format!("{} ({})", artifact.kind, artifact.path.display()));
        }
    }

    if let Some(plan) = &report.layer_plan {
        output.kv(
            "Layers",
            format!("{} placed ({:?} layout) in {}", plan.layer_count(), plan.variant, layout.layer_plan().display()),
        );
    }
    for path in &report.removed {
        output.info(format!("Removed {}", path.display()));
    }

    if !report.diagnostics.is_empty() {
        output.section("Diagnostics");
        output.table(report.diagnostics.iter().map(DiagnosticRow::from).collect::<Vec<_>>());
    }

    println!();
    match report.state {
        PipelineState::Aborted(stage) => output.warning(format!(
            "Workflow stopped at {}. Details in {}",
            stage,
            layout.run_report().display()
        )),
        _ => output.success(format!(
            "Workflow finished in {}s",
            report.duration().num_seconds()
        )),
    }

    Ok(())
}

/// Everything a run would do, in order
fn plan(request: &RunRequest, layout: &WorkspaceLayout, tools: &ToolPaths) -> Result<Vec<PlannedAction>> {
    let mut actions: Vec<PlannedAction> = layout
        .directories()
        .iter()
        .filter(|dir| !dir.is_dir())
        .map(|dir| PlannedAction::new(ActionType::CreateDirectory, format!("Create {}", dir.display())))
        .collect();

    let describe = request.rasters.iter().fold(
        PlannedAction::new(
            ActionType::RunProcess,
            format!("Check input rasters with {}", tools.gdalinfo.display()),
        ),
        |action, raster| action.with_detail(raster.display().to_string()),
    );
    actions.push(describe);

    let mask = mask_arguments(&request.rasters, &layout.mask())?;
    actions.push(
        PlannedAction::new(ActionType::RunProcess, "Build validity mask")
            .with_detail(format!("{} {}", tools.gdal_calc.display(), mask.join(" "))),
    );

    let cfg = SomConfiguration::for_layout(layout, request.parameters.clone());
    let p = &cfg.parameters;
    actions.push(
        PlannedAction::new(
            ActionType::WriteFile,
            format!("Write {}", layout.config_document().display()),
        )
        .with_detail(format!("Grid: {} x {} ({}, {})", p.grid_width, p.grid_height, p.grid_shape, p.topology))
        .with_detail(format!("Epochs: {}", p.epochs))
        .with_detail(format!(
            "Neighborhood: {} (coefficient {})",
            p.neighborhood, p.neighborhood_coeff
        ))
        .with_detail(format!(
            "Clusters: {} initial, {} to {}",
            p.clusters.initial, p.clusters.min, p.clusters.max
        )),
    );

    let stages = [
        ("Create training set", training_set_command(tools, layout, request)),
        ("Train the SOM", training_command(tools, layout)),
        ("Create result rasters", result_command(tools, layout, request)),
    ];
    for (description, command) in stages {
        actions.push(PlannedAction::new(ActionType::RunProcess, description).with_detail(command.to_string()));
    }

    actions.push(PlannedAction::new(
        ActionType::WriteFile,
        format!("Write layer plan {}", layout.layer_plan().display()),
    ));
    actions.push(PlannedAction::new(
        ActionType::WriteFile,
        format!("Write run report {}", layout.run_report().display()),
    ));

    if request.delete_intermediates {
        let cleanup = layout.intermediates().into_iter().fold(
            PlannedAction::new(ActionType::DeleteFile, "Delete intermediate results"),
            |action, path| action.with_detail(path.display().to_string()),
        );
        actions.push(cleanup);
    }

    Ok(actions)
}
