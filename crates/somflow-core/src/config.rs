use crate::error::{Result, SomflowError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional tool configuration file
pub const CONFIG_FILE_NAME: &str = "somflow.toml";

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Locations of the external collaborators and tuning knobs
///
/// None of these are run parameters; they describe the host the run
/// executes on.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Training-set extraction executable
    pub lrn_tool: ConfigValue<PathBuf>,
    /// SOM training executable
    pub train_tool: ConfigValue<PathBuf>,
    /// Result-raster generation executable
    pub result_tool: ConfigValue<PathBuf>,
    pub gdalinfo: ConfigValue<PathBuf>,
    pub gdal_calc: ConfigValue<PathBuf>,
    /// Empty group-layer template enabling the grouped result layout
    pub group_template: ConfigValue<PathBuf>,
    /// Style template applied to SOM-space layers
    pub color_source: ConfigValue<PathBuf>,
    /// Per-process timeout; `None` waits indefinitely
    pub process_timeout_secs: ConfigValue<Option<u64>>,
    /// GDAL version prefix the raster tools must report
    pub required_gdal_version: ConfigValue<Option<String>>,
}

impl LayeredConfig {
    /// Create a configuration with the bundled tools under `tools_dir`
    pub fn with_defaults(tools_dir: &Path) -> Self {
        let exe = |name: &str| tools_dir.join(format!("{}{}", name, env::consts::EXE_SUFFIX));
        Self {
            lrn_tool: ConfigValue::new(exe("Run_CreateSOMLrnFile"), ConfigSource::Default),
            train_tool: ConfigValue::new(exe("nextsom_wrap"), ConfigSource::Default),
            result_tool: ConfigValue::new(exe("CreateSOMResultRaster"), ConfigSource::Default),
            gdalinfo: ConfigValue::new(PathBuf::from("gdalinfo"), ConfigSource::Default),
            gdal_calc: ConfigValue::new(PathBuf::from("gdal_calc.py"), ConfigSource::Default),
            group_template: ConfigValue::new(
                tools_dir.join("EmptyLayer.lyr"),
                ConfigSource::Default,
            ),
            color_source: ConfigValue::new(
                tools_dir.join("ColorSource.lyr"),
                ConfigSource::Default,
            ),
            process_timeout_secs: ConfigValue::new(None, ConfigSource::Default),
            required_gdal_version: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| SomflowError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| SomflowError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let tools = file_config.tools.unwrap_or_default();
        let src = ConfigSource::File;
        if let Some(path) = tools.lrn_tool {
            self.lrn_tool.update(path, src);
        }
        if let Some(path) = tools.train_tool {
            self.train_tool.update(path, src);
        }
        if let Some(path) = tools.result_tool {
            self.result_tool.update(path, src);
        }
        if let Some(path) = tools.gdalinfo {
            self.gdalinfo.update(path, src);
        }
        if let Some(path) = tools.gdal_calc {
            self.gdal_calc.update(path, src);
        }

        let templates = file_config.templates.unwrap_or_default();
        if let Some(path) = templates.group_template {
            self.group_template.update(path, src);
        }
        if let Some(path) = templates.color_source {
            self.color_source.update(path, src);
        }

        if let Some(secs) = file_config.process_timeout_secs {
            self.process_timeout_secs.update(timeout_value(secs), src);
        }
        if let Some(version) = file_config.required_gdal_version {
            self.required_gdal_version.update(Some(version), src);
        }

        Ok(self)
    }

    /// Load the config file only when it exists
    pub fn load_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            self.load_from_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        let src = ConfigSource::Environment;
        let path_vars: [(&str, &mut ConfigValue<PathBuf>); 7] = [
            ("SOMFLOW_LRN_TOOL", &mut self.lrn_tool),
            ("SOMFLOW_TRAIN_TOOL", &mut self.train_tool),
            ("SOMFLOW_RESULT_TOOL", &mut self.result_tool),
            ("SOMFLOW_GDALINFO", &mut self.gdalinfo),
            ("SOMFLOW_GDAL_CALC", &mut self.gdal_calc),
            ("SOMFLOW_GROUP_TEMPLATE", &mut self.group_template),
            ("SOMFLOW_COLOR_SOURCE", &mut self.color_source),
        ];
        for (var, value) in path_vars {
            if let Ok(path) = env::var(var) {
                value.update(PathBuf::from(path), src);
            }
        }

        // SOMFLOW_PROCESS_TIMEOUT
        if let Ok(timeout_str) = env::var("SOMFLOW_PROCESS_TIMEOUT") {
            match timeout_str.parse::<u64>() {
                Ok(secs) => self.process_timeout_secs.update(timeout_value(secs), src),
                Err(_) => tracing::warn!(
                    "Invalid SOMFLOW_PROCESS_TIMEOUT value '{}': expected whole seconds",
                    timeout_str
                ),
            }
        }

        // SOMFLOW_GDAL_VERSION
        if let Ok(version) = env::var("SOMFLOW_GDAL_VERSION") {
            self.required_gdal_version.update(Some(version), src);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        let src = ConfigSource::Cli;
        if let Some(path) = overrides.tools_dir {
            let defaults = Self::with_defaults(&path);
            self.lrn_tool.update(defaults.lrn_tool.value, src);
            self.train_tool.update(defaults.train_tool.value, src);
            self.result_tool.update(defaults.result_tool.value, src);
            self.group_template.update(defaults.group_template.value, src);
            self.color_source.update(defaults.color_source.value, src);
        }
        if let Some(secs) = overrides.process_timeout_secs {
            self.process_timeout_secs.update(timeout_value(secs), src);
        }
    }

    /// Resolve into plain tool paths
    pub fn tools(&self) -> ToolPaths {
        ToolPaths {
            lrn_tool: self.lrn_tool.value.clone(),
            train_tool: self.train_tool.value.clone(),
            result_tool: self.result_tool.value.clone(),
            gdalinfo: self.gdalinfo.value.clone(),
            gdal_calc: self.gdal_calc.value.clone(),
            group_template: self.group_template.value.clone(),
            color_source: self.color_source.value.clone(),
            process_timeout: self.process_timeout_secs.value.map(Duration::from_secs),
            required_gdal_version: self.required_gdal_version.value.clone(),
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();
        let paths = [
            ("lrn_tool", &self.lrn_tool),
            ("train_tool", &self.train_tool),
            ("result_tool", &self.result_tool),
            ("gdalinfo", &self.gdalinfo),
            ("gdal_calc", &self.gdal_calc),
            ("group_template", &self.group_template),
            ("color_source", &self.color_source),
        ];
        for (key, value) in paths {
            map.insert(key.to_string(), (value.value.display().to_string(), value.source));
        }

        map.insert(
            "process_timeout_secs".to_string(),
            (
                self.process_timeout_secs
                    .value
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                self.process_timeout_secs.source,
            ),
        );

        map.insert(
            "required_gdal_version".to_string(),
            (
                self.required_gdal_version.value.clone().unwrap_or_else(|| "any".to_string()),
                self.required_gdal_version.source,
            ),
        );

        map
    }
}

/// Zero means "no timeout"
fn timeout_value(secs: u64) -> Option<u64> {
    (secs > 0).then_some(secs)
}

/// Resolved collaborator locations handed to the stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub lrn_tool: PathBuf,
    pub train_tool: PathBuf,
    pub result_tool: PathBuf,
    pub gdalinfo: PathBuf,
    pub gdal_calc: PathBuf,
    pub group_template: PathBuf,
    pub color_source: PathBuf,
    pub process_timeout: Option<Duration>,
    pub required_gdal_version: Option<String>,
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    tools: Option<ToolsSection>,
    templates: Option<TemplatesSection>,
    process_timeout_secs: Option<u64>,
    required_gdal_version: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ToolsSection {
    lrn_tool: Option<PathBuf>,
    train_tool: Option<PathBuf>,
    result_tool: Option<PathBuf>,
    gdalinfo: Option<PathBuf>,
    gdal_calc: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TemplatesSection {
    group_template: Option<PathBuf>,
    color_source: Option<PathBuf>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    /// Directory holding the bundled executables and layer templates
    pub tools_dir: Option<PathBuf>,
    pub process_timeout_secs: Option<u64>,
}

/// Directory of the bundled tools: `tools/` next to the running executable
pub fn default_tools_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tools")))
        .unwrap_or_else(|| PathBuf::from("tools"))
}
