//! Workspace manager
//!
//! Prepares the fixed directory layout under a caller-supplied root. Running
//! it again on a prepared workspace is a no-op.

use std::fs;
use std::path::Path;

use crate::error::{Result, SomflowError};
use crate::models::WorkspaceLayout;

const PROBE_FILE: &str = ".somflow-write-probe";

/// Create the staging, result and output directories under `root`
pub fn ensure_layout(root: &Path) -> Result<WorkspaceLayout> {
    if root.exists() && !root.is_dir() {
        return Err(SomflowError::Workspace {
            path: root.to_path_buf(),
            reason: "path exists but is not a directory".to_string(),
        });
    }

    fs::create_dir_all(root).map_err(|e| SomflowError::Workspace {
        path: root.to_path_buf(),
        reason: format!("cannot create workspace root: {}", e),
    })?;

    probe_writable(root)?;

    let layout = WorkspaceLayout::at(root);
    for dir in layout.directories() {
        ensure_directory(dir)?;
    }

    Ok(layout)
}

fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        tracing::debug!(path = %dir.display(), "Directory already present");
        return Ok(());
    }
    if dir.exists() {
        return Err(SomflowError::Workspace {
            path: dir.to_path_buf(),
            reason: "path exists but is not a directory".to_string(),
        });
    }

    fs::create_dir_all(dir).map_err(|e| SomflowError::Workspace {
        path: dir.to_path_buf(),
        reason: format!("cannot create directory: {}", e),
    })?;
    tracing::info!(path = %dir.display(), "Created directory");
    Ok(())
}

fn probe_writable(root: &Path) -> Result<()> {
    let probe = root.join(PROBE_FILE);
    fs::write(&probe, b"").map_err(|e| SomflowError::Workspace {
        path: root.to_path_buf(),
        reason: format!("workspace root is not writable: {}", e),
    })?;
    fs::remove_file(&probe)?;
    Ok(())
}
