use console::style;
use somflow_core::SomflowError;
use somflow_pipeline::PipelineError;
use somflow_raster::RasterError;
use std::fmt;
use std::path::Path;

/// Run completed, or stopped at a gate
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_UNEXPECTED: i32 = 1;
/// Missing collaborator or wrong raster-tool version
pub const EXIT_ENVIRONMENT: i32 = 2;
pub const EXIT_VALIDATION: i32 = 3;
pub const EXIT_WORKSPACE: i32 = 4;
/// Invalid run parameters or tool configuration
pub const EXIT_INVALID_INPUT: i32 = 5;

/// Enhanced error type with suggestions
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
    pub exit_code: i32,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
            exit_code: EXIT_UNEXPECTED,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Create error for a host that cannot run the workflow
pub fn environment_unavailable(reason: &str) -> CliError {
    CliError::new("Application environment error")
        .with_context(format!("The host cannot run the SOM workflow.\n\nReason: {}", reason))
        .with_suggestion("Install GDAL so that gdalinfo and gdal_calc.py are on PATH")
        .with_suggestion("Point --tools-dir at the directory holding the SOM executables")
        .with_suggestion("Or set individual tool paths in somflow.toml")
        .with_help("Run: somflow check")
        .with_exit_code(EXIT_ENVIRONMENT)
}

/// Create error for a raster-tool version mismatch
pub fn version_mismatch(required: &str, found: &str) -> CliError {
    CliError::new("Raster tools version mismatch")
        .with_context(format!("Required GDAL version: {}\nFound: {}", required, found))
        .with_suggestion(format!("Install GDAL {}", required))
        .with_suggestion("Or change required_gdal_version in somflow.toml")
        .with_help("Run: somflow config")
        .with_exit_code(EXIT_ENVIRONMENT)
}

/// Create error for input rasters that do not fit together
pub fn inconsistent_rasters(reason: &str) -> CliError {
    CliError::new("Input rasters are inconsistent")
        .with_context(reason.to_string())
        .with_suggestion("Resample the rasters to a common cell size")
        .with_suggestion("Project all rasters into the same coordinate system")
        .with_exit_code(EXIT_VALIDATION)
}

/// Create error for an unreadable input raster
pub fn raster_unreadable(path: &Path, reason: &str) -> CliError {
    CliError::new("Input raster cannot be read")
        .with_context(format!("Path: {}\n\nReason: {}", path.display(), reason))
        .with_suggestion("Check the raster path and try again")
        .with_suggestion("Separate multiple rasters with ';'")
        .with_exit_code(EXIT_VALIDATION)
}

/// Create error for a workspace that cannot be prepared
pub fn workspace_unusable(path: &Path, reason: &str) -> CliError {
    CliError::new("Workspace cannot be used")
        .with_context(format!("Path: {}\n\nReason: {}", path.display(), reason))
        .with_suggestion("Choose a directory you can write to")
        .with_suggestion("Or prepare it first: somflow init <path>")
        .with_help("Run: somflow init --help")
        .with_exit_code(EXIT_WORKSPACE)
}

/// Create error for an invalid run parameter
pub fn invalid_parameter(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid parameter: {}", key))
        .with_context(format!("Reason: {}", reason))
        .with_help("Run: somflow run --help")
        .with_exit_code(EXIT_INVALID_INPUT)
}

/// Create error for invalid configuration
pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check somflow.toml for syntax errors")
        .with_help("Run: somflow config")
        .with_exit_code(EXIT_INVALID_INPUT)
}

fn from_core(error: &SomflowError) -> CliError {
    match error {
        SomflowError::Environment { reason } => environment_unavailable(reason),
        SomflowError::Version { required, found } => version_mismatch(required, found),
        SomflowError::Validation { reason } => inconsistent_rasters(reason),
        SomflowError::Workspace { path, reason } => workspace_unusable(path, reason),
        SomflowError::ParameterInvalid { key, reason } => invalid_parameter(key, reason),
        SomflowError::ConfigInvalid { key, reason } => invalid_config(key, reason),
        SomflowError::ConfigDocument { .. } | SomflowError::Xml(_) => {
            CliError::new("Invalid SOM configuration document")
                .with_context(error.to_string())
                .with_exit_code(EXIT_INVALID_INPUT)
        }
        SomflowError::Io(_) | SomflowError::Serialization(_) => CliError::new(error.to_string()),
    }
}

fn from_raster(error: &RasterError) -> CliError {
    match error {
        RasterError::ToolUnavailable { .. } => environment_unavailable(&error.to_string()),
        RasterError::Describe { path, reason } => raster_unreadable(path, reason),
        RasterError::StagingNotWritable { path, reason } => workspace_unusable(path, reason),
        RasterError::Mask { .. } | RasterError::MaskMissing { .. } | RasterError::Io(_) => {
            CliError::new(error.to_string())
        }
    }
}

fn from_pipeline(error: &PipelineError) -> CliError {
    match error {
        PipelineError::Core(e) => from_core(e),
        PipelineError::Raster(e) => from_raster(e),
        other => CliError::new(other.to_string()),
    }
}

/// Convert anyhow::Error to CliError with context and exit code
pub fn from_anyhow(error: &anyhow::Error) -> CliError {
    if let Some(e) = error.downcast_ref::<PipelineError>() {
        return from_pipeline(e);
    }
    if let Some(e) = error.downcast_ref::<RasterError>() {
        return from_raster(e);
    }
    if let Some(e) = error.downcast_ref::<SomflowError>() {
        return from_core(e);
    }

    let message = error.to_string();
    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {:#}", error))
            .with_suggestion("Check the file path and try again")
    } else if message.to_lowercase().contains("permission denied") {
        CliError::new("Permission denied")
            .with_context(format!("Error: {:#}", error))
            .with_suggestion("Check file permissions")
    } else {
        CliError::new(format!("{:#}", error))
    }
}
