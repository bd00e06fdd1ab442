use somflow_core::models::WorkspaceLayout;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

/// Remove the intermediate artifacts of a finished run
///
/// Deletes the staging directory and the training set, both text exports and
/// the configuration document. Entries that are already gone are skipped.
/// Returns the paths actually removed.
pub fn cleanup(layout: &WorkspaceLayout, delete_intermediates: bool) -> Result<Vec<PathBuf>> {
    if !delete_intermediates {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for path in layout.intermediates() {
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else if path.exists() {
            fs::remove_file(&path)?;
        } else {
            continue;
        }
        tracing::debug!(path = %path.display(), "Removed intermediate");
        removed.push(path);
    }

    tracing::info!(removed = removed.len(), "Intermediate results deleted");
    Ok(removed)
}
