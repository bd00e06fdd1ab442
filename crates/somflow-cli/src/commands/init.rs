//! Init command implementation

use crate::cli::InitArgs;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::InitOutput;
use anyhow::Result;
use somflow_core::models::WorkspaceLayout;
use somflow_core::workspace::ensure_layout;

pub fn execute(args: InitArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    if dry_run {
        let layout = WorkspaceLayout::at(&args.path);
        let actions: Vec<PlannedAction> = layout
            .directories()
            .iter()
            .filter(|dir| !dir.is_dir())
            .map(|dir| {
                PlannedAction::new(
                    ActionType::CreateDirectory,
                    format!("Create {}", dir.display()),
                )
            })
            .collect();

        display_planned_actions(output, &actions)?;
        return Ok(());
    }

    let layout = ensure_layout(&args.path)?;

    let directories: Vec<String> = layout
        .directories()
        .iter()
        .map(|dir| dir.display().to_string())
        .collect();

    if output.is_json() {
        output.result(InitOutput {
            workspace_path: layout.root.display().to_string(),
            directories,
        })?;
    } else {
        output.success(format!("Prepared workspace at {}", layout.root.display()));

        output.section("Directories");
        for dir in directories {
            output.info(dir);
        }
    }

    Ok(())
}
