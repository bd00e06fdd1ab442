use chrono::Utc;
use somflow_core::config::ToolPaths;
use somflow_core::models::{ArtifactKind, RunRequest, SomConfiguration, WorkspaceLayout};
use somflow_core::som_xml::write_configuration;
use somflow_core::workspace::ensure_layout;
use somflow_raster::ports::RasterBackend;
use somflow_raster::{build_mask, validate, RasterError, ValidationReport};
use tokio_util::sync::CancellationToken;

use crate::cleanup::cleanup;
use crate::commands::{result_command, training_command, training_set_command};
use crate::error::{PipelineError, Result};
use crate::loader::{load_results, LayerTemplates};
use crate::process::{ProcessRunner, StageCommand};
use crate::report::RunReport;
use crate::repository::{apply_plan, LayerRepository};
use crate::state::{Diagnostic, DiagnosticKind, PipelineState, Stage};

/// Progress information emitted when a stage starts
#[derive(Debug, Clone)]
pub struct StageProgress {
    pub stage: Stage,
    pub message: String,
}

/// Gated pipeline controller
///
/// Runs validation, mask, configuration, the three external stages, result
/// loading and cleanup strictly in order. After each stage the declared
/// outputs are checked on disk; a missing output is reported as a
/// diagnostic and the run stops in `Aborted(stage)` without error.
pub struct PipelineController<R, P, L>
where
    R: RasterBackend,
    P: ProcessRunner,
    L: LayerRepository,
{
    raster: R,
    runner: P,
    layers: L,
    tools: ToolPaths,
}

impl<R, P, L> PipelineController<R, P, L>
where
    R: RasterBackend,
    P: ProcessRunner,
    L: LayerRepository,
{
    pub fn new(raster: R, runner: P, layers: L, tools: ToolPaths) -> Self {
        Self { raster, runner, layers, tools }
    }

    pub async fn run(&self, request: &RunRequest, cancel: &CancellationToken) -> Result<RunReport> {
        self.run_with_progress(request, cancel, |_| {}).await
    }

    /// Run the workflow, reporting each stage as it starts
    ///
    /// Returns `Err` only for fatal conditions (workspace, unreadable
    /// rasters, I/O). Gate failures, validation failures and cancellation
    /// are recorded in the returned report.
    pub async fn run_with_progress<F>(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<RunReport>
    where
        F: FnMut(StageProgress),
    {
        let layout = ensure_layout(&request.workspace_root)?;
        tracing::info!(workspace = %layout.root.display(), rasters = request.rasters.len(), "Starting SOM workflow");

        let mut report = RunReport::new(&layout.root);
        self.drive(request, &layout, cancel, &mut report, &mut progress).await?;
        report.finished_at = Utc::now();

        report.save(&layout.run_report())?;
        match report.state {
            PipelineState::Aborted(stage) => {
                tracing::warn!(stage = %stage, "Workflow stopped early")
            }
            state => tracing::info!(state = %state, "Workflow finished"),
        }
        Ok(report)
    }

    async fn drive<F>(
        &self,
        request: &RunRequest,
        layout: &WorkspaceLayout,
        cancel: &CancellationToken,
        report: &mut RunReport,
        progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(StageProgress),
    {
        // Validation
        if !checkpoint(Stage::Validation, cancel, report, progress) {
            return Ok(());
        }
        match validate(&self.raster, &request.rasters).await? {
            ValidationReport::Consistent { rasters } => report.rasters = rasters,
            ValidationReport::Inconsistent { reason, mismatches } => {
                for m in &mismatches {
                    tracing::debug!(raster = %m.raster, property = ?m.property, expected = %m.expected, found = %m.found, "Raster mismatch");
                }
                tracing::error!(reason = %reason, "Input rasters do not fit together");
                report.diagnostics.push(Diagnostic::error(
                    Stage::Validation,
                    DiagnosticKind::Validation,
                    reason,
                ));
                transition(report, PipelineState::Aborted(Stage::Validation));
                return Ok(());
            }
        }

        // Mask
        if !checkpoint(Stage::Mask, cancel, report, progress) {
            return Ok(());
        }
        match build_mask(&self.raster, &request.rasters, &layout.staging).await {
            Ok(_) => {}
            Err(e @ RasterError::StagingNotWritable { .. }) => return Err(e.into()),
            // the gate below reports the missing artifact
            Err(RasterError::MaskMissing { path }) => {
                tracing::debug!(path = %path.display(), "Mask tool succeeded without output");
            }
            Err(e) => {
                let exit_code = match &e {
                    RasterError::Mask { exit_code, .. } => *exit_code,
                    _ => None,
                };
                tracing::warn!(error = %e, exit_code = ?exit_code, "Mask computation failed");
                report.diagnostics.push(Diagnostic::warning(
                    Stage::Mask,
                    DiagnosticKind::ExternalProcess { exit_code },
                    e.to_string(),
                ));
            }
        }
        if !gate(Stage::Mask, &[ArtifactKind::Mask], layout, report) {
            return Ok(());
        }
        transition(report, PipelineState::Masked);

        // Configuration document
        if !checkpoint(Stage::Configuration, cancel, report, progress) {
            return Ok(());
        }
        let cfg = SomConfiguration::for_layout(layout, request.parameters.clone());
        let document = write_configuration(&cfg, &layout.config_document())?;
        tracing::debug!(path = %document.display(), "SOM configuration written");

        // Training set
        if !checkpoint(Stage::TrainingSet, cancel, report, progress) {
            return Ok(());
        }
        let command = training_set_command(&self.tools, layout, request);
        if !self.run_stage(Stage::TrainingSet, &command, &[ArtifactKind::TrainingSet], layout, report).await? {
            return Ok(());
        }
        transition(report, PipelineState::TrainingSetReady);

        // Training
        if !checkpoint(Stage::Training, cancel, report, progress) {
            return Ok(());
        }
        let command = training_command(&self.tools, layout);
        let exports = [ArtifactKind::GeoSpaceExport, ArtifactKind::SomSpaceExport];
        if !self.run_stage(Stage::Training, &command, &exports, layout, report).await? {
            return Ok(());
        }
        transition(report, PipelineState::Trained);

        // Result rasters
        if !checkpoint(Stage::Results, cancel, report, progress) {
            return Ok(());
        }
        let command = result_command(&self.tools, layout, request);
        if !self.run_stage(Stage::Results, &command, &ArtifactKind::RESULTS, layout, report).await? {
            return Ok(());
        }
        transition(report, PipelineState::ResultsReady);

        // Loading
        if !checkpoint(Stage::Loading, cancel, report, progress) {
            return Ok(());
        }
        let templates = LayerTemplates {
            group: self.tools.group_template.clone(),
            color_source: self.tools.color_source.clone(),
        };
        let plan = load_results(&layout.geo_space, &layout.som_space, &templates)?;
        let applied = apply_plan(&self.layers, &plan).await;
        report.layer_plan = Some(plan);
        if let Err(e) = applied {
            tracing::error!(error = %e, "Result layers could not be placed");
            report.diagnostics.push(Diagnostic::error(Stage::Loading, DiagnosticKind::Layer, e.to_string()));
            transition(report, PipelineState::Aborted(Stage::Loading));
            return Ok(());
        }
        transition(report, PipelineState::Loaded);

        // Cleanup
        if !checkpoint(Stage::Cleanup, cancel, report, progress) {
            return Ok(());
        }
        report.removed = cleanup(layout, request.delete_intermediates)?;
        transition(report, PipelineState::Cleaned);

        Ok(())
    }

    /// Run one external stage and check its outputs
    ///
    /// A non-zero exit is reported but the filesystem still decides the gate.
    async fn run_stage(
        &self,
        stage: Stage,
        command: &StageCommand,
        outputs: &[ArtifactKind],
        layout: &WorkspaceLayout,
        report: &mut RunReport,
    ) -> Result<bool> {
        tracing::debug!(stage = %stage, command = %command, "Invoking external stage");

        match self.runner.run(command).await {
            Ok(exit) if exit.success() => {}
            Ok(exit) => {
                let message = match exit.code {
                    Some(code) => format!("{} exited with code {}", command.program.display(), code),
                    None => format!("{} was terminated", command.program.display()),
                };
                let message = if exit.stderr.is_empty() {
                    message
                } else {
                    format!("{}: {}", message, exit.stderr)
                };
                tracing::warn!(stage = %stage, exit_code = ?exit.code, "{}", message);
                report.diagnostics.push(Diagnostic::warning(
                    stage,
                    DiagnosticKind::ExternalProcess { exit_code: exit.code },
                    message,
                ));
            }
            Err(e @ (PipelineError::Spawn { .. } | PipelineError::Timeout { .. })) => {
                tracing::error!(stage = %stage, error = %e, "External stage failed");
                report.diagnostics.push(Diagnostic::error(
                    stage,
                    DiagnosticKind::ExternalProcess { exit_code: None },
                    e.to_string(),
                ));
                transition(report, PipelineState::Aborted(stage));
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        Ok(gate(stage, outputs, layout, report))
    }
}

/// Check cancellation and announce the stage
fn checkpoint<F>(stage: Stage, cancel: &CancellationToken, report: &mut RunReport, progress: &mut F) -> bool
where
    F: FnMut(StageProgress),
{
    if cancel.is_cancelled() {
        tracing::warn!(stage = %stage, "Run cancelled");
        report.diagnostics.push(Diagnostic::warning(
            stage,
            DiagnosticKind::Cancelled,
            format!("Run cancelled before {}", stage),
        ));
        transition(report, PipelineState::Aborted(stage));
        return false;
    }

    progress(StageProgress { stage, message: stage_message(stage).to_string() });
    true
}

/// Existence gate over a stage's declared outputs
///
/// Every missing artifact gets its own diagnostic.
fn gate(stage: Stage, outputs: &[ArtifactKind], layout: &WorkspaceLayout, report: &mut RunReport) -> bool {
    let mut passed = true;
    for kind in outputs {
        let artifact = kind.locate(layout);
        if artifact.exists() {
            tracing::info!(artifact = %kind, "File '{}' successfully created.", kind);
            report.artifacts.push(artifact);
        } else {
            tracing::warn!(stage = %stage, artifact = %kind, path = %artifact.path.display(), "Stage output missing");
            report.diagnostics.push(Diagnostic::missing(stage, *kind));
            passed = false;
        }
    }

    if !passed {
        transition(report, PipelineState::Aborted(stage));
    }
    passed
}

fn transition(report: &mut RunReport, next: PipelineState) {
    tracing::debug!(from = %report.state, to = %next, "State transition");
    report.state = next;
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Validation => "Checking input rasters",
        Stage::Mask => "Building validity mask",
        Stage::Configuration => "Writing 'SOM.xml'",
        Stage::TrainingSet => "Creating 'SOM.lrn'",
        Stage::Training => "Training the SOM",
        Stage::Results => "Creating results. This can take a few minutes.",
        Stage::Loading => "Loading result layers",
        Stage::Cleanup => "Deleting intermediate results",
    }
}
