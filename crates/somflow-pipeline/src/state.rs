use serde::Serialize;
use somflow_core::models::ArtifactKind;
use std::fmt;

/// A step of the workflow, used to name where a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Mask,
    Configuration,
    TrainingSet,
    Training,
    Results,
    Loading,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Mask => "mask",
            Stage::Configuration => "configuration",
            Stage::TrainingSet => "training-set extraction",
            Stage::Training => "SOM training",
            Stage::Results => "result-raster generation",
            Stage::Loading => "result loading",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline controller states
///
/// Every forward transition is gated on the previous stage's output
/// existing on disk. `Aborted` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Masked,
    TrainingSetReady,
    Trained,
    ResultsReady,
    Loaded,
    Cleaned,
    Aborted(Stage),
}

impl PipelineState {
    pub fn aborted_at(&self) -> Option<Stage> {
        match self {
            PipelineState::Aborted(stage) => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Start => f.write_str("start"),
            PipelineState::Masked => f.write_str("masked"),
            PipelineState::TrainingSetReady => f.write_str("training set ready"),
            PipelineState::Trained => f.write_str("trained"),
            PipelineState::ResultsReady => f.write_str("results ready"),
            PipelineState::Loaded => f.write_str("loaded"),
            PipelineState::Cleaned => f.write_str("cleaned"),
            PipelineState::Aborted(stage) => write!(f, "aborted at {}", stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// What kind of condition a diagnostic reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    Validation,
    ArtifactMissing { artifact: ArtifactKind },
    ExternalProcess { exit_code: Option<i32> },
    Layer,
    Cancelled,
}

/// A reported, non-fatal condition of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self { stage, severity: Severity::Warning, kind, message: message.into() }
    }

    pub fn error(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self { stage, severity: Severity::Error, kind, message: message.into() }
    }

    pub fn missing(stage: Stage, artifact: ArtifactKind) -> Self {
        Self::warning(
            stage,
            DiagnosticKind::ArtifactMissing { artifact },
            format!("File '{}' was not created.", artifact),
        )
    }

    pub fn is_missing(&self, artifact: ArtifactKind) -> bool {
        self.kind == DiagnosticKind::ArtifactMissing { artifact }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
