//! Startup check of the host environment
//!
//! Runs before any stage and reports, rather than raises, whether the
//! collaborators needed by a run are present.

use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::ToolPaths;
use crate::error::{Result, SomflowError};

/// Outcome of [`check_environment`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnvironmentStatus {
    Ok { gdal_version: String },
    EnvironmentError { reason: String },
    VersionError { required: String, found: String },
}

impl EnvironmentStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, EnvironmentStatus::Ok { .. })
    }

    pub fn into_result(self) -> Result<String> {
        match self {
            EnvironmentStatus::Ok { gdal_version } => Ok(gdal_version),
            EnvironmentStatus::EnvironmentError { reason } => {
                Err(SomflowError::Environment { reason })
            }
            EnvironmentStatus::VersionError { required, found } => {
                Err(SomflowError::Version { required, found })
            }
        }
    }
}

/// Verify collaborators exist and the raster tools have the required version
pub async fn check_environment(tools: &ToolPaths) -> EnvironmentStatus {
    let executables = [
        ("training-set extraction tool", &tools.lrn_tool),
        ("SOM training tool", &tools.train_tool),
        ("result-raster tool", &tools.result_tool),
        ("gdal_calc", &tools.gdal_calc),
    ];

    let missing: Vec<String> = executables
        .iter()
        .filter(|(_, path)| locate_executable(path).is_none())
        .map(|(label, path)| format!("{} not found at {}", label, path.display()))
        .collect();

    if !missing.is_empty() {
        return EnvironmentStatus::EnvironmentError { reason: missing.join("; ") };
    }

    let found = match gdal_version(&tools.gdalinfo).await {
        Ok(version) => version,
        Err(reason) => return EnvironmentStatus::EnvironmentError { reason },
    };
    tracing::debug!(version = %found, "Detected GDAL");

    match &tools.required_gdal_version {
        Some(required) if !found.starts_with(required.as_str()) => {
            EnvironmentStatus::VersionError { required: required.clone(), found }
        }
        _ => EnvironmentStatus::Ok { gdal_version: found },
    }
}

/// Resolve an executable either as a path or through `PATH`
pub fn locate_executable(path: &Path) -> Option<PathBuf> {
    if path.is_absolute() || path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let search = env::var_os("PATH")?;
    env::split_paths(&search).find_map(|dir| {
        let candidate = dir.join(path);
        if candidate.is_file() {
            return Some(candidate);
        }
        let with_suffix = dir.join(format!("{}{}", path.display(), env::consts::EXE_SUFFIX));
        with_suffix.is_file().then_some(with_suffix)
    })
}

async fn gdal_version(gdalinfo: &Path) -> std::result::Result<String, String> {
    let output = Command::new(gdalinfo)
        .arg("--version")
        .output()
        .await
        .map_err(|e| format!("cannot run {}: {}", gdalinfo.display(), e))?;

    if !output.status.success() {
        return Err(format!(
            "{} --version exited with {:?}",
            gdalinfo.display(),
            output.status.code()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_gdal_version(&stdout)
        .ok_or_else(|| format!("unrecognized version output: {}", stdout.trim()))
}

/// Extract `3.6.2` from `GDAL 3.6.2, released 2023/01/02`
pub fn parse_gdal_version(output: &str) -> Option<String> {
    let rest = output.trim().strip_prefix("GDAL ")?;
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    (!version.is_empty()).then_some(version)
}
