use somflow_core::models::workspace::MASK_FILE;
use somflow_core::models::RasterSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RasterError, Result};
use crate::ports::RasterBackend;

/// Compute the validity mask into `<staging_dir>/mask`
///
/// The backend writes `1` wherever the arithmetic sum of all inputs is not
/// NoData, which is equivalent to "every input has data" only while no
/// input carries values that overflow the sum.
pub async fn build_mask<B>(backend: &B, rasters: &RasterSet, staging_dir: &Path) -> Result<PathBuf>
where
    B: RasterBackend + ?Sized,
{
    ensure_writable(staging_dir)?;

    let output = staging_dir.join(MASK_FILE);
    tracing::info!(inputs = rasters.len(), output = %output.display(), "Building validity mask");

    backend.compute_mask(rasters, &output).await?;

    if !output.exists() {
        return Err(RasterError::MaskMissing { path: output });
    }

    Ok(output)
}

fn ensure_writable(dir: &Path) -> Result<()> {
    let not_writable = |reason: String| RasterError::StagingNotWritable {
        path: dir.to_path_buf(),
        reason,
    };

    if !dir.is_dir() {
        return Err(not_writable("not a directory".to_string()));
    }

    let probe = dir.join(".somflow-mask-probe");
    fs::write(&probe, b"").map_err(|e| not_writable(e.to_string()))?;
    fs::remove_file(&probe).map_err(|e| not_writable(e.to_string()))?;
    Ok(())
}
