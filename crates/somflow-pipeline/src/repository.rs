use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PipelineError, Result};
use crate::loader::{GroupPlacement, LayerPlacement, LayerPlacementPlan};

/// Handle to a group created by a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub usize);

/// Handle to a layer created by a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub usize);

/// Port for the mapping host that displays result layers
#[async_trait]
pub trait LayerRepository: Send + Sync {
    /// Add a group built from `template`, at the bottom of `parent` or of the map
    async fn add_group(&self, parent: Option<GroupId>, name: &str, template: &Path)
        -> Result<GroupId>;

    async fn describe_group(&self, group: GroupId, description: &str) -> Result<()>;

    /// Add a raster layer at the bottom of `group` or of the map
    async fn add_layer(&self, group: Option<GroupId>, name: &str, source: &Path)
        -> Result<LayerId>;

    async fn apply_style(&self, layer: LayerId, template: &Path) -> Result<()>;

    async fn refresh(&self) -> Result<()>;
}

/// Apply a placement plan in order
pub async fn apply_plan<L>(repository: &L, plan: &LayerPlacementPlan) -> Result<()>
where
    L: LayerRepository + ?Sized,
{
    for group in &plan.groups {
        place_group(repository, None, group).await?;
        repository.refresh().await?;
    }
    for layer in &plan.layers {
        place_layer(repository, None, layer).await?;
    }
    repository.refresh().await?;

    tracing::info!(variant = ?plan.variant, layers = plan.layer_count(), "Result layers placed");
    Ok(())
}

async fn place_group<L>(repository: &L, parent: Option<GroupId>, group: &GroupPlacement) -> Result<()>
where
    L: LayerRepository + ?Sized,
{
    let mut pending = vec![(parent, group)];
    while let Some((parent, group)) = pending.pop() {
        let id = repository.add_group(parent, &group.name, &group.template).await?;
        repository.describe_group(id, &group.description).await?;

        for layer in &group.layers {
            place_layer(repository, Some(id), layer).await?;
        }
        if let Some(sub) = &group.subgroup {
            pending.push((Some(id), sub.as_ref()));
        }
    }
    Ok(())
}

async fn place_layer<L>(repository: &L, group: Option<GroupId>, layer: &LayerPlacement) -> Result<()>
where
    L: LayerRepository + ?Sized,
{
    let id = repository.add_layer(group, &layer.name, &layer.source).await?;
    if let Some(style) = &layer.style {
        repository.apply_style(id, style).await?;
    }
    Ok(())
}

/// Entry of the table of contents written by [`ManifestRepository`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestEntry {
    Group {
        name: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        description: String,
        template: PathBuf,
        children: Vec<ManifestEntry>,
    },
    Layer {
        name: String,
        source: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<PathBuf>,
    },
}

#[derive(Default)]
struct ManifestState {
    entries: Vec<ManifestEntry>,
    /// Index path from the root to each group
    groups: Vec<Vec<usize>>,
    layers: Vec<Vec<usize>>,
}

impl ManifestState {
    fn children_mut(&mut self, group: Option<GroupId>) -> Result<(&mut Vec<ManifestEntry>, Vec<usize>)> {
        let Some(GroupId(id)) = group else {
            return Ok((&mut self.entries, Vec::new()));
        };
        let path = self.groups.get(id).cloned().ok_or_else(|| unknown("group", id))?;
        match entry_mut(&mut self.entries, &path)? {
            ManifestEntry::Group { children, .. } => Ok((children, path)),
            ManifestEntry::Layer { .. } => Err(unknown("group", id)),
        }
    }

    fn push(&mut self, group: Option<GroupId>, entry: ManifestEntry) -> Result<Vec<usize>> {
        let (children, mut path) = self.children_mut(group)?;
        path.push(children.len());
        children.push(entry);
        Ok(path)
    }
}

fn entry_mut<'a>(entries: &'a mut [ManifestEntry], path: &[usize]) -> Result<&'a mut ManifestEntry> {
    let (first, rest) = path.split_first().ok_or_else(|| unknown("entry", 0))?;
    let entry = entries.get_mut(*first).ok_or_else(|| unknown("entry", *first))?;
    if rest.is_empty() {
        return Ok(entry);
    }
    match entry {
        ManifestEntry::Group { children, .. } => entry_mut(children, rest),
        ManifestEntry::Layer { .. } => Err(unknown("entry", *first)),
    }
}

fn unknown(what: &str, id: usize) -> PipelineError {
    PipelineError::Layer { reason: format!("unknown {} {}", what, id) }
}

/// Layer repository that records the table of contents and writes it as
/// JSON on every refresh, for a mapping host to pick up
pub struct ManifestRepository {
    path: PathBuf,
    state: Mutex<ManifestState>,
}

impl ManifestRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), state: Mutex::new(ManifestState::default()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<ManifestEntry>> {
        Ok(self.lock()?.entries.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ManifestState>> {
        self.state
            .lock()
            .map_err(|_| PipelineError::Layer { reason: "manifest lock poisoned".to_string() })
    }
}

#[async_trait]
impl LayerRepository for ManifestRepository {
    async fn add_group(
        &self,
        parent: Option<GroupId>,
        name: &str,
        template: &Path,
    ) -> Result<GroupId> {
        let mut state = self.lock()?;
        let path = state.push(
            parent,
            ManifestEntry::Group {
                name: name.to_string(),
                description: String::new(),
                template: template.to_path_buf(),
                children: Vec::new(),
            },
        )?;
        state.groups.push(path);
        Ok(GroupId(state.groups.len() - 1))
    }

    async fn describe_group(&self, group: GroupId, text: &str) -> Result<()> {
        let mut state = self.lock()?;
        let path = state.groups.get(group.0).cloned().ok_or_else(|| unknown("group", group.0))?;
        if let ManifestEntry::Group { description, .. } = entry_mut(&mut state.entries, &path)? {
            *description = text.to_string();
        }
        Ok(())
    }

    async fn add_layer(
        &self,
        group: Option<GroupId>,
        name: &str,
        source: &Path,
    ) -> Result<LayerId> {
        let mut state = self.lock()?;
        let path = state.push(
            group,
            ManifestEntry::Layer {
                name: name.to_string(),
                source: source.to_path_buf(),
                style: None,
            },
        )?;
        state.layers.push(path);
        Ok(LayerId(state.layers.len() - 1))
    }

    async fn apply_style(&self, layer: LayerId, template: &Path) -> Result<()> {
        let mut state = self.lock()?;
        let path = state.layers.get(layer.0).cloned().ok_or_else(|| unknown("layer", layer.0))?;
        if let ManifestEntry::Layer { style, .. } = entry_mut(&mut state.entries, &path)? {
            *style = Some(template.to_path_buf());
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.lock()?.entries)?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Layer manifest written");
        Ok(())
    }
}
