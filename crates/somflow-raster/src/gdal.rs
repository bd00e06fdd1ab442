//! Raster backend driving the GDAL command-line utilities
//!
//! Metadata comes from `gdalinfo -json`, the mask from `gdal_calc.py`.

use async_trait::async_trait;
use serde::Deserialize;
use somflow_core::models::RasterSet;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{RasterError, Result};
use crate::models::{Extent, RasterInfo, ReferenceKind, SpatialReference};
use crate::ports::RasterBackend;

/// Band letters accepted by gdal_calc
const CALC_BANDS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// NoData value of the Byte mask
pub const MASK_NODATA: u8 = 255;

pub struct GdalCli {
    gdalinfo: PathBuf,
    gdal_calc: PathBuf,
    timeout: Option<Duration>,
}

impl GdalCli {
    pub fn new(gdalinfo: impl Into<PathBuf>, gdal_calc: impl Into<PathBuf>) -> Self {
        Self { gdalinfo: gdalinfo.into(), gdal_calc: gdal_calc.into(), timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, tool: &Path, args: &[String]) -> Result<Output> {
        let mut command = Command::new(tool);
        command.args(args).kill_on_drop(true);
        tracing::debug!(tool = %tool.display(), args = ?args, "Running raster tool");

        let unavailable = |reason: String| RasterError::ToolUnavailable {
            tool: tool.display().to_string(),
            reason,
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| unavailable(format!("timed out after {:?}", limit)))?,
            None => command.output().await,
        };
        output.map_err(|e| unavailable(e.to_string()))
    }
}

#[async_trait]
impl RasterBackend for GdalCli {
    async fn describe(&self, path: &Path) -> Result<RasterInfo> {
        let args = vec!["-json".to_string(), path.display().to_string()];
        let output = self.run(&self.gdalinfo, &args).await?;

        if !output.status.success() {
            return Err(RasterError::Describe {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_gdalinfo(path, &String::from_utf8_lossy(&output.stdout))
    }

    async fn compute_mask(&self, rasters: &RasterSet, output: &Path) -> Result<()> {
        let args = mask_arguments(rasters, output)?;
        let result = self.run(&self.gdal_calc, &args).await?;

        if !result.status.success() {
            let exit_code = result.status.code();
            let reason = match exit_code {
                Some(code) => format!("gdal_calc exited with code {}", code),
                None => "gdal_calc was terminated".to_string(),
            };
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = match stderr.trim() {
                "" => reason,
                detail => format!("{}: {}", reason, detail),
            };
            return Err(RasterError::Mask { reason, exit_code });
        }
        Ok(())
    }
}

/// Build the gdal_calc argument list for the arithmetic-sum mask
///
/// gdal_calc propagates NoData from any input, so `1+0*(A+B+..)` is `1`
/// exactly where the sum has data.
pub fn mask_arguments(rasters: &RasterSet, output: &Path) -> Result<Vec<String>> {
    if rasters.len() > CALC_BANDS.len() {
        return Err(RasterError::Mask {
            reason: format!(
                "gdal_calc accepts at most {} inputs, got {}",
                CALC_BANDS.len(),
                rasters.len()
            ),
            exit_code: None,
        });
    }

    let mut args = Vec::with_capacity(rasters.len() * 2 + 6);
    let mut letters = Vec::with_capacity(rasters.len());
    for (letter, path) in CALC_BANDS.iter().zip(rasters.iter()) {
        let letter = char::from(*letter).to_string();
        args.push(format!("-{}", letter));
        args.push(path.display().to_string());
        letters.push(letter);
    }

    args.push(format!("--outfile={}", output.display()));
    args.push(format!("--calc=1+0*({})", letters.join("+")));
    args.push("--type=Byte".to_string());
    args.push(format!("--NoDataValue={}", MASK_NODATA));
    args.push("--format=GTiff".to_string());
    args.push("--overwrite".to_string());
    Ok(args)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GdalInfo {
    size: [u64; 2],
    geo_transform: Option<[f64; 6]>,
    coordinate_system: Option<CoordinateSystem>,
}

#[derive(Debug, Deserialize)]
struct CoordinateSystem {
    #[serde(default)]
    wkt: String,
}

/// Parse `gdalinfo -json` output
pub fn parse_gdalinfo(path: &Path, json: &str) -> Result<RasterInfo> {
    let info: GdalInfo = serde_json::from_str(json).map_err(|e| RasterError::Describe {
        path: path.to_path_buf(),
        reason: format!("unexpected gdalinfo output: {}", e),
    })?;

    let transform = info.geo_transform.ok_or_else(|| RasterError::Describe {
        path: path.to_path_buf(),
        reason: "raster has no geotransform".to_string(),
    })?;

    let [width, height] = info.size;
    let x0 = transform[0];
    let y0 = transform[3];
    let x1 = x0 + transform[1] * width as f64 + transform[2] * height as f64;
    let y1 = y0 + transform[4] * width as f64 + transform[5] * height as f64;

    let spatial_reference = match info.coordinate_system.as_ref().map(|cs| cs.wkt.trim()) {
        Some(wkt) if !wkt.is_empty() => {
            parse_wkt_reference(wkt).unwrap_or_else(|| unnamed_reference(wkt))
        }
        _ => SpatialReference::unknown(),
    };

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    Ok(RasterInfo {
        path: path.to_path_buf(),
        name,
        cell_width: transform[1].abs(),
        cell_height: transform[5].abs(),
        extent: Extent {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        },
        spatial_reference,
    })
}

/// Name, kind and EPSG code of the CRS a WKT (1 or 2) string describes
///
/// A WKT2 `BOUNDCRS` only attaches a datum transformation, so it is
/// described by its `SOURCECRS`.
pub fn parse_wkt_reference(wkt: &str) -> Option<SpatialReference> {
    let wkt = wkt.trim();
    let open = wkt.find('[')?;
    let keyword = wkt[..open].trim();
    if keyword == "BOUNDCRS" {
        return parse_wkt_reference(element_body(wkt, "SOURCECRS")?);
    }

    let rest = wkt[open + 1..].trim_start().strip_prefix('"')?;
    let name = &rest[..rest.find('"')?];

    let kind = match keyword {
        "PROJCRS" | "PROJCS" | "PROJECTEDCRS" => ReferenceKind::Projected,
        "GEOGCRS" | "GEOGCS" | "GEODCRS" | "GEOGRAPHICCRS" => ReferenceKind::Geographic,
        _ => ReferenceKind::Unknown,
    };

    Some(SpatialReference { name: name.to_string(), kind, epsg: root_epsg(wkt) })
}

/// Reference for a WKT whose CRS name cannot be read
///
/// The whitespace-normalized WKT stands in for the name so that two such
/// rasters only match when their definitions do.
fn unnamed_reference(wkt: &str) -> SpatialReference {
    SpatialReference {
        name: wkt.split_whitespace().collect::<Vec<_>>().join(" "),
        kind: ReferenceKind::Unknown,
        epsg: root_epsg(wkt),
    }
}

/// Contents of the first `keyword[...]` element, brackets excluded
fn element_body<'a>(wkt: &'a str, keyword: &str) -> Option<&'a str> {
    let start = wkt.find(&format!("{}[", keyword))? + keyword.len() + 1;
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in wkt[start..].char_indices() {
        match c {
            '"' => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => {
                if depth == 0 {
                    return Some(&wkt[start..start + i]);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// The root authority code is the last one in the string
fn root_epsg(wkt: &str) -> Option<u32> {
    let marker = ["ID[\"EPSG\",", "AUTHORITY[\"EPSG\",\""]
        .iter()
        .filter_map(|m| wkt.rfind(m).map(|pos| pos + m.len()))
        .max()?;
    let digits: String = wkt[marker..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
