//! somflow Pipeline - Gated orchestration of the external SOM stages
//!
//! This crate sequences mask, training-set extraction, SOM training and
//! result-raster generation, checks every stage's outputs on disk, turns the
//! results into a layer placement plan and cleans up intermediates.

pub mod cleanup;
pub mod commands;
pub mod controller;
pub mod error;
pub mod loader;
pub mod process;
pub mod report;
pub mod repository;
pub mod state;

pub use cleanup::cleanup;
pub use controller::{PipelineController, StageProgress};
pub use error::{PipelineError, Result};
pub use loader::{load_results, LayerPlacementPlan, LayerTemplates, PlanVariant};
pub use process::{ProcessExit, ProcessRunner, StageCommand, TokioProcessRunner};
pub use report::RunReport;
pub use repository::{apply_plan, LayerRepository, ManifestRepository};
pub use state::{Diagnostic, DiagnosticKind, PipelineState, Severity, Stage};
