//! Integration tests for the gated pipeline controller
//!
//! External processes are replaced by a scripted runner that creates the
//! files a real stage would create, or nothing at all.

use async_trait::async_trait;
use somflow_core::config::ToolPaths;
use somflow_core::models::som::{
    ClusterCounts, Cooling, DecimalText, GridShape, Initialization, MapTopology,
    NeighborhoodFunction, SomParameters,
};
use somflow_core::models::{ArtifactKind, RasterSet, RunRequest, WorkspaceLayout};
use somflow_core::SomflowError;
use somflow_pipeline::{
    DiagnosticKind, ManifestRepository, PipelineController, PipelineError, PipelineState,
    ProcessExit, ProcessRunner, Severity, Stage, StageCommand,
};
use somflow_raster::models::{Extent, RasterInfo, ReferenceKind, SpatialReference};
use somflow_raster::ports::RasterBackend;
use somflow_raster::RasterError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const LRN: &str = "Run_CreateSOMLrnFile";
const TRAIN: &str = "nextsom_wrap";
const RESULT: &str = "CreateSOMResultRaster";

/// Raster backend reporting fixed cell sizes and writing the mask on request
struct FakeRaster {
    cells: HashMap<PathBuf, f64>,
    writes_mask: bool,
    mask_exit: Option<i32>,
    mask_calls: Arc<Mutex<usize>>,
}

impl FakeRaster {
    fn uniform(rasters: &RasterSet) -> Self {
        Self {
            cells: rasters.iter().map(|p| (p.to_path_buf(), 30.0)).collect(),
            writes_mask: true,
            mask_exit: None,
            mask_calls: Arc::default(),
        }
    }
}

#[async_trait]
impl RasterBackend for FakeRaster {
    async fn describe(&self, path: &Path) -> somflow_raster::Result<RasterInfo> {
        let cell = self.cells.get(path).copied().unwrap_or(30.0);
        Ok(RasterInfo {
            path: path.to_path_buf(),
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            cell_width: cell,
            cell_height: cell,
            extent: Extent { xmin: 0.0, ymin: 0.0, xmax: 3000.0, ymax: 3000.0 },
            spatial_reference: SpatialReference {
                name: "WGS 84 / UTM zone 33N".to_string(),
                kind: ReferenceKind::Projected,
                epsg: Some(32633),
            },
        })
    }

    async fn compute_mask(&self, _rasters: &RasterSet, output: &Path) -> somflow_raster::Result<()> {
        *self.mask_calls.lock().unwrap() += 1;
        if self.writes_mask {
            fs::write(output, b"mask")?;
        }
        match self.mask_exit {
            Some(code) => Err(RasterError::Mask {
                reason: format!("gdal_calc exited with code {}", code),
                exit_code: Some(code),
            }),
            None => Ok(()),
        }
    }
}

/// What a scripted stage does when invoked
#[derive(Clone)]
enum Script {
    Produce { files: Vec<PathBuf>, code: i32 },
    TimeOut,
    Cancel(CancellationToken),
}

#[derive(Clone, Default)]
struct ScriptedRunner {
    scripts: Arc<Mutex<HashMap<&'static str, Script>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    /// Every stage writes its outputs and exits cleanly
    fn complete(layout: &WorkspaceLayout) -> Self {
        let runner = Self::default();
        runner.script(LRN, Script::Produce { files: vec![layout.training_set()], code: 0 });
        runner.script(
            TRAIN,
            Script::Produce {
                files: vec![layout.geospace_export(), layout.somspace_export()],
                code: 0,
            },
        );
        runner.script(
            RESULT,
            Script::Produce {
                files: vec![
                    layout.geo_cluster(),
                    layout.quant_error(),
                    layout.som_cluster(),
                    layout.umatrix(),
                    layout.geo_space.join("bmu_a"),
                    layout.som_space.join("bmu_a"),
                ],
                code: 0,
            },
        );
        runner
    }

    fn script(&self, program: &'static str, script: Script) {
        self.scripts.lock().unwrap().insert(program, script);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &StageCommand) -> somflow_pipeline::Result<ProcessExit> {
        let name = command.program.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(name.clone());

        let script = self.scripts.lock().unwrap().get(name.as_str()).cloned();
        match script {
            Some(Script::Produce { files, code }) => {
                for file in files {
                    fs::write(file, b"data").unwrap();
                }
                Ok(ProcessExit { code: Some(code), stderr: String::new() })
            }
            Some(Script::TimeOut) => Err(PipelineError::Timeout {
                program: command.program.clone(),
                timeout: Duration::from_secs(1),
            }),
            Some(Script::Cancel(token)) => {
                token.cancel();
                Ok(ProcessExit { code: Some(0), stderr: String::new() })
            }
            None => Ok(ProcessExit { code: Some(0), stderr: String::new() }),
        }
    }
}

fn tools(dir: &Path) -> ToolPaths {
    ToolPaths {
        lrn_tool: dir.join(LRN),
        train_tool: dir.join(TRAIN),
        result_tool: dir.join(RESULT),
        gdalinfo: PathBuf::from("gdalinfo"),
        gdal_calc: PathBuf::from("gdal_calc.py"),
        group_template: dir.join("EmptyLayer.lyr"),
        color_source: dir.join("ColorSource.lyr"),
        process_timeout: None,
        required_gdal_version: None,
    }
}

fn request(root: &Path, delete_intermediates: bool) -> RunRequest {
    let parameters = SomParameters {
        grid_width: 10,
        grid_height: 8,
        epochs: 1000,
        topology: MapTopology::Planar,
        grid_shape: GridShape::Rectangular,
        neighborhood: NeighborhoodFunction::Gaussian,
        neighborhood_coeff: DecimalText::parse("0,5").unwrap(),
        initialization: Initialization::Random,
        radius_initial: 0,
        radius_final: 1,
        radius_cooling: Cooling::Linear,
        rate_initial: DecimalText::parse("0,1").unwrap(),
        rate_final: DecimalText::parse("0,01").unwrap(),
        rate_cooling: Cooling::Linear,
        clusters: ClusterCounts { initial: 5, min: 2, max: 25 },
    };
    let rasters = RasterSet::parse("/d/a.tif;/d/b.tif;/d/c.tif").unwrap();
    RunRequest::new(root, rasters, parameters, delete_intermediates).unwrap()
}

struct Harness {
    _temp: TempDir,
    layout: WorkspaceLayout,
    request: RunRequest,
    tools: ToolPaths,
}

impl Harness {
    fn new(delete_intermediates: bool) -> Self {
        let temp = TempDir::new().unwrap();
        let tools_dir = temp.path().join("tools");
        fs::create_dir_all(&tools_dir).unwrap();
        let root = temp.path().join("ws");
        Self {
            layout: WorkspaceLayout::at(&root),
            request: request(&root, delete_intermediates),
            tools: tools(&tools_dir),
            _temp: temp,
        }
    }

    fn controller(
        &self,
        raster: FakeRaster,
        runner: ScriptedRunner,
    ) -> PipelineController<FakeRaster, ScriptedRunner, ManifestRepository> {
        let layers = ManifestRepository::new(self.layout.layer_plan());
        PipelineController::new(raster, runner, layers, self.tools.clone())
    }
}

#[tokio::test]
async fn test_complete_run_with_cleanup() {
    let h = Harness::new(true);
    fs::write(&h.tools.group_template, b"lyr").unwrap();
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner.clone());

    let mut stages = Vec::new();
    let report = controller
        .run_with_progress(&h.request, &CancellationToken::new(), |p| stages.push(p.stage))
        .await
        .unwrap();

    assert_eq!(report.state, PipelineState::Cleaned);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(runner.calls(), [LRN, TRAIN, RESULT]);
    assert_eq!(stages.len(), 8);
    assert_eq!(report.rasters.len(), 3);

    // every gated artifact was recorded once
    assert_eq!(report.artifacts.len(), 8);

    // intermediates are gone, results stay
    assert_eq!(report.removed.len(), 5);
    assert!(!h.layout.staging.exists());
    assert!(!h.layout.config_document().exists());
    assert!(h.layout.geo_cluster().exists());
    assert!(h.layout.layer_plan().exists());
    assert!(h.layout.run_report().exists());

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(h.layout.run_report()).unwrap()).unwrap();
    assert_eq!(saved["state"]["state"], "cleaned");
}

#[tokio::test]
async fn test_configuration_document_written_after_mask() {
    let h = Harness::new(false);
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner);

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Cleaned);
    let xml = fs::read_to_string(h.layout.config_document()).unwrap();
    assert!(xml.contains("<std_coeff>0.5</std_coeff>"));
    assert!(xml.contains("<som_x>10</som_x>"));
    assert!(xml.contains("<som_y>8</som_y>"));

    // nothing removed without the flag
    assert!(report.removed.is_empty());
    assert!(h.layout.training_set().exists());
}

#[tokio::test]
async fn test_noop_stage_halts_pipeline() {
    let cases = [
        (LRN, Stage::TrainingSet, vec![LRN], vec![ArtifactKind::TrainingSet]),
        (
            TRAIN,
            Stage::Training,
            vec![LRN, TRAIN],
            vec![ArtifactKind::GeoSpaceExport, ArtifactKind::SomSpaceExport],
        ),
        (RESULT, Stage::Results, vec![LRN, TRAIN, RESULT], ArtifactKind::RESULTS.to_vec()),
    ];

    for (program, stage, expected_calls, missing) in cases {
        let h = Harness::new(true);
        let runner = ScriptedRunner::complete(&h.layout);
        runner.script(program, Script::Produce { files: Vec::new(), code: 0 });
        let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner.clone());

        let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.state, PipelineState::Aborted(stage));
        assert_eq!(runner.calls(), expected_calls);
        assert_eq!(report.diagnostics.len(), missing.len());
        for kind in &missing {
            assert!(report.diagnostics.iter().any(|d| d.is_missing(*kind)), "{} not reported", kind);
        }

        // aborted runs keep their intermediates even with the flag set
        assert!(h.layout.staging.exists());
        assert!(h.layout.mask().exists());
        assert!(report.removed.is_empty());
        assert!(!h.layout.layer_plan().exists());
    }
}

#[tokio::test]
async fn test_each_missing_result_reported_individually() {
    let h = Harness::new(true);
    let runner = ScriptedRunner::complete(&h.layout);
    runner.script(
        RESULT,
        Script::Produce { files: vec![h.layout.geo_cluster(), h.layout.som_cluster()], code: 0 },
    );
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner);

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Aborted(Stage::Results));
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report.diagnostics.iter().any(|d| d.is_missing(ArtifactKind::QuantError)));
    assert!(report.diagnostics.iter().any(|d| d.is_missing(ArtifactKind::UMatrix)));
    assert!(h.layout.training_set().exists());
}

#[tokio::test]
async fn test_inconsistent_rasters_stop_before_mask() {
    let h = Harness::new(false);
    let mut raster = FakeRaster::uniform(&h.request.rasters);
    raster.cells.insert(PathBuf::from("/d/b.tif"), 50.0);
    let mask_calls = raster.mask_calls.clone();
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(raster, runner.clone());

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Aborted(Stage::Validation));
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Validation);
    assert!(report.diagnostics[0].message.contains("a.tif"));
    assert_eq!(*mask_calls.lock().unwrap(), 0);
    assert!(runner.calls().is_empty());
    assert!(!h.layout.mask().exists());
}

#[tokio::test]
async fn test_missing_mask_stops_before_extraction() {
    let h = Harness::new(false);
    let mut raster = FakeRaster::uniform(&h.request.rasters);
    raster.writes_mask = false;
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(raster, runner.clone());

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Aborted(Stage::Mask));
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].is_missing(ArtifactKind::Mask));
    assert!(runner.calls().is_empty());
    assert!(!h.layout.config_document().exists());
}

#[tokio::test]
async fn test_mask_tool_exit_code_reported() {
    let h = Harness::new(false);
    let mut raster = FakeRaster::uniform(&h.request.rasters);
    raster.writes_mask = false;
    raster.mask_exit = Some(3);
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(raster, runner.clone());

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Aborted(Stage::Mask));
    let kinds: Vec<_> = report.diagnostics.iter().map(|d| d.kind.clone()).collect();
    assert_eq!(
        kinds,
        [
            DiagnosticKind::ExternalProcess { exit_code: Some(3) },
            DiagnosticKind::ArtifactMissing { artifact: ArtifactKind::Mask },
        ]
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_mask_tool_failure_with_output_continues() {
    let h = Harness::new(false);
    let mut raster = FakeRaster::uniform(&h.request.rasters);
    raster.mask_exit = Some(1);
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(raster, runner.clone());

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Cleaned);
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, Stage::Mask);
    assert_eq!(warnings[0].kind, DiagnosticKind::ExternalProcess { exit_code: Some(1) });
}

#[tokio::test]
async fn test_nonzero_exit_reported_but_gate_follows_files() {
    let h = Harness::new(false);
    let runner = ScriptedRunner::complete(&h.layout);
    runner.script(LRN, Script::Produce { files: vec![h.layout.training_set()], code: 2 });
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner.clone());

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Cleaned);
    assert_eq!(runner.calls(), [LRN, TRAIN, RESULT]);
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, Stage::TrainingSet);
    assert_eq!(warnings[0].kind, DiagnosticKind::ExternalProcess { exit_code: Some(2) });
}

#[tokio::test]
async fn test_timeout_aborts_stage() {
    let h = Harness::new(false);
    let runner = ScriptedRunner::complete(&h.layout);
    runner.script(TRAIN, Script::TimeOut);
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner.clone());

    let report = controller.run(&h.request, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, PipelineState::Aborted(Stage::Training));
    assert_eq!(runner.calls(), [LRN, TRAIN]);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].severity, Severity::Error);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = Harness::new(false);
    let runner = ScriptedRunner::complete(&h.layout);
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = controller.run(&h.request, &cancel).await.unwrap();

    assert_eq!(report.state, PipelineState::Aborted(Stage::Validation));
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Cancelled);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_checked_at_next_boundary() {
    let h = Harness::new(false);
    let cancel = CancellationToken::new();
    let runner = ScriptedRunner::complete(&h.layout);
    runner.script(LRN, Script::Cancel(cancel.clone()));
    fs::create_dir_all(&h.layout.root).unwrap();
    fs::write(h.layout.training_set(), b"lrn").unwrap();
    let controller = h.controller(FakeRaster::uniform(&h.request.rasters), runner.clone());

    let report = controller.run(&h.request, &cancel).await.unwrap();

    // the running stage completes, the next one never starts
    assert_eq!(report.state, PipelineState::Aborted(Stage::Training));
    assert_eq!(runner.calls(), [LRN]);
}

#[tokio::test]
async fn test_workspace_root_is_file() {
    let h = Harness::new(false);
    fs::write(&h.layout.root, b"not a directory").unwrap();
    let controller =
        h.controller(FakeRaster::uniform(&h.request.rasters), ScriptedRunner::default());

    let result = controller.run(&h.request, &CancellationToken::new()).await;

    assert!(matches!(result, Err(PipelineError::Core(SomflowError::Workspace { .. }))));
}
