use indicatif::{ProgressBar, ProgressStyle};
use somflow_pipeline::{PipelineState, RunReport, StageProgress};
use std::time::Duration;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {}", message));
}

/// Finish a progress bar with error message
pub fn finish_error(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✗ {}", message));
}

/// One spinner per pipeline stage
///
/// A stage's spinner is finished when the next stage starts, so a stage
/// that fails its gate is the one left running when [`finish`] is called.
///
/// [`finish`]: StageSpinners::finish
#[derive(Default)]
pub struct StageSpinners {
    current: Option<(ProgressBar, String)>,
}

impl StageSpinners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, progress: StageProgress) {
        if let Some((pb, message)) = self.current.take() {
            finish_success(&pb, &message);
        }
        self.current = Some((create_spinner(&progress.message), progress.message));
    }

    pub fn finish(&mut self, report: &RunReport) {
        let Some((pb, message)) = self.current.take() else {
            return;
        };
        match report.state {
            PipelineState::Aborted(stage) => {
                finish_error(&pb, &format!("{} (stopped at {})", message, stage))
            }
            _ => finish_success(&pb, &message),
        }
    }
}
