//! Result loader
//!
//! Turns the two result directories into a [`LayerPlacementPlan`]: pure
//! data describing which layers go where, applied later by a
//! [`crate::repository::LayerRepository`].

use serde::{Deserialize, Serialize};
use somflow_core::models::workspace::{
    GEO_CLUSTER_FILE, QUANT_ERROR_FILE, SOM_CLUSTER_FILE, UMATRIX_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const GEO_GROUP_NAME: &str = "Geospace Data";
pub const SOM_GROUP_NAME: &str = "SOM Space Data";
pub const BMU_GROUP_NAME: &str = "BMU Data";

const GEO_GROUP_DESCRIPTION: &str = "This is a group layer of geospace results.";
const SOM_GROUP_DESCRIPTION: &str = "This is a group layer of SOM-space results.";
const BMU_GROUP_DESCRIPTION: &str = "This is a group layer of input rasters";

/// Entries of a result directory that are never diagnostic layers
const GEO_DESIGNATED: [&str; 3] = ["geo_cluster", "quant_error", "info"];
const SOM_DESIGNATED: [&str; 3] = ["som_cluster", "umatrix", "info"];

/// Style templates used while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTemplates {
    /// Empty group layer; grouping is skipped when it is missing
    pub group: PathBuf,
    /// Shared symbology for SOM-space cluster and U-matrix layers
    pub color_source: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanVariant {
    Grouped,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPlacement {
    pub name: String,
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlacement {
    pub name: String,
    pub description: String,
    pub template: PathBuf,
    pub layers: Vec<LayerPlacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<Box<GroupPlacement>>,
}

impl GroupPlacement {
    fn layers_recursive<'a>(&'a self, out: &mut Vec<&'a LayerPlacement>) {
        out.extend(self.layers.iter());
        if let Some(sub) = &self.subgroup {
            sub.layers_recursive(out);
        }
    }
}

/// Declarative description of the layers to add to the map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPlacementPlan {
    pub variant: PlanVariant,
    /// Top-level groups, in display order (grouped variant)
    pub groups: Vec<GroupPlacement>,
    /// Ungrouped layers, in display order (flat variant)
    pub layers: Vec<LayerPlacement>,
}

impl LayerPlacementPlan {
    /// Every layer of the plan in placement order
    pub fn all_layers(&self) -> Vec<&LayerPlacement> {
        let mut out = Vec::new();
        for group in &self.groups {
            group.layers_recursive(&mut out);
        }
        out.extend(self.layers.iter());
        out
    }

    pub fn layer_count(&self) -> usize {
        self.all_layers().len()
    }
}

/// Layers found in one result directory
struct ResultSpace {
    designated: Vec<LayerPlacement>,
    diagnostics: Vec<LayerPlacement>,
}

/// Build the placement plan for the two result directories
///
/// The grouped variant is used when the group template exists; otherwise
/// every layer is placed flat with the same names and styles.
pub fn load_results(
    geo_dir: &Path,
    som_dir: &Path,
    templates: &LayerTemplates,
) -> Result<LayerPlacementPlan> {
    let geo = ResultSpace {
        designated: vec![
            layer(geo_dir, GEO_CLUSTER_FILE, "Geo Cluster", None),
            layer(geo_dir, QUANT_ERROR_FILE, "Quantization Error", None),
        ],
        diagnostics: diagnostic_layers(geo_dir, &GEO_DESIGNATED)?,
    };
    let color = Some(templates.color_source.clone());
    let som = ResultSpace {
        designated: vec![
            layer(som_dir, SOM_CLUSTER_FILE, "SOM Cluster", color.clone()),
            layer(som_dir, UMATRIX_FILE, "U-Matrix", color),
        ],
        diagnostics: diagnostic_layers(som_dir, &SOM_DESIGNATED)?,
    };

    if templates.group.exists() {
        tracing::debug!(template = %templates.group.display(), "Placing results in groups");
        Ok(LayerPlacementPlan {
            variant: PlanVariant::Grouped,
            groups: vec![
                group(GEO_GROUP_NAME, GEO_GROUP_DESCRIPTION, &templates.group, geo),
                group(SOM_GROUP_NAME, SOM_GROUP_DESCRIPTION, &templates.group, som),
            ],
            layers: Vec::new(),
        })
    } else {
        tracing::warn!(
            template = %templates.group.display(),
            "Group template not found, placing results without grouping"
        );
        let layers = [geo, som]
            .into_iter()
            .flat_map(|space| space.designated.into_iter().chain(space.diagnostics))
            .collect();
        Ok(LayerPlacementPlan { variant: PlanVariant::Flat, groups: Vec::new(), layers })
    }
}

fn layer(dir: &Path, file: &str, name: &str, style: Option<PathBuf>) -> LayerPlacement {
    LayerPlacement { name: name.to_string(), source: dir.join(file), style }
}

fn group(name: &str, description: &str, template: &Path, space: ResultSpace) -> GroupPlacement {
    GroupPlacement {
        name: name.to_string(),
        description: description.to_string(),
        template: template.to_path_buf(),
        layers: space.designated,
        subgroup: Some(Box::new(GroupPlacement {
            name: BMU_GROUP_NAME.to_string(),
            description: BMU_GROUP_DESCRIPTION.to_string(),
            template: template.to_path_buf(),
            layers: space.diagnostics,
            subgroup: None,
        })),
    }
}

/// Per-input diagnostic rasters: every listed entry except the designated ones
fn diagnostic_layers(dir: &Path, designated: &[&str]) -> Result<Vec<LayerPlacement>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_candidate(name))
        .filter(|name| !is_designated(name, designated))
        .collect();
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| LayerPlacement { source: dir.join(&name), name, style: None })
        .collect())
}

fn is_candidate(name: &str) -> bool {
    !name.starts_with('.') && !name.to_ascii_lowercase().ends_with(".aux.xml")
}

/// Compared case-insensitively on the name up to the first `.`
fn is_designated(name: &str, designated: &[&str]) -> bool {
    let stem = name.split('.').next().unwrap_or(name).to_ascii_lowercase();
    designated.contains(&stem.as_str())
}
