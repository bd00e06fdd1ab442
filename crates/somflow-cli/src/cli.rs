use clap::{ArgAction, Parser, Subcommand};
use somflow_core::models::som::{
    ClusterCounts, Cooling, DecimalText, GridShape, Initialization, MapTopology,
    NeighborhoodFunction, SomParameters,
};
use somflow_core::models::{RasterSet, RunRequest};
use std::path::PathBuf;

/// somflow - Self-organizing-map clustering of geospatial rasters
#[derive(Parser, Debug)]
#[command(name = "somflow")]
#[command(about = "Self-organizing-map clustering of geospatial rasters", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show planned actions without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Tool configuration file (defaults to ./somflow.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the SOM executables and layer templates
    #[arg(long, global = true, value_name = "DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Timeout for each external process in seconds (0 waits indefinitely)
    #[arg(long, global = true, value_name = "SECS")]
    pub process_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full clustering workflow
    Run(RunArgs),

    /// Prepare the workspace directory layout
    Init(InitArgs),

    /// Check that the external tools are installed
    Check,

    /// Show the resolved tool configuration and where each value came from
    Config,

    /// Read and display a SOM configuration document
    InspectConfig(InspectConfigArgs),
}

/// The twenty run parameters; none has a default
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Workspace root directory
    #[arg(long)]
    pub workspace: PathBuf,

    /// Input rasters, joined with ';'
    #[arg(long, value_name = "LIST")]
    pub rasters: String,

    /// Number of cells in x-direction
    #[arg(long)]
    pub grid_width: u32,

    /// Number of cells in y-direction
    #[arg(long)]
    pub grid_height: u32,

    /// Number of training epochs
    #[arg(long)]
    pub epochs: u32,

    /// Minimum number of k-means clusters
    #[arg(long)]
    pub min_clusters: u32,

    /// Maximum number of k-means clusters
    #[arg(long)]
    pub max_clusters: u32,

    /// Number of initial k-means centroids
    #[arg(long)]
    pub initial_clusters: u32,

    /// Map topology (planar or toroid)
    #[arg(long)]
    pub topology: String,

    /// Grid shape (rectangular or hexagonal)
    #[arg(long)]
    pub grid_shape: String,

    /// Delete intermediate files after a complete run (true or false)
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub delete_intermediates: bool,

    /// Initialization of the prototype vectors (random or pca)
    #[arg(long)]
    pub initialization: String,

    /// Neighborhood function (gaussian or bubble)
    #[arg(long)]
    pub neighborhood: String,

    /// Standard deviation coefficient; ',' is accepted as decimal separator
    #[arg(long, value_name = "DECIMAL", allow_hyphen_values = true)]
    pub neighborhood_coeff: String,

    /// Initial neighborhood radius
    #[arg(long)]
    pub radius_initial: u32,

    /// Final neighborhood radius
    #[arg(long)]
    pub radius_final: u32,

    /// Radius cooling (linear or exponential)
    #[arg(long)]
    pub radius_cooling: String,

    /// Initial learning rate
    #[arg(long, value_name = "DECIMAL", allow_hyphen_values = true)]
    pub rate_initial: String,

    /// Final learning rate
    #[arg(long, value_name = "DECIMAL", allow_hyphen_values = true)]
    pub rate_final: String,

    /// Learning-rate cooling (linear or exponential)
    #[arg(long)]
    pub rate_cooling: String,
}

impl RunArgs {
    /// Parse the textual parameters and build the run request
    pub fn to_request(&self) -> somflow_core::Result<RunRequest> {
        let parameters = SomParameters {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            epochs: self.epochs,
            topology: self.topology.parse::<MapTopology>()?,
            grid_shape: self.grid_shape.parse::<GridShape>()?,
            neighborhood: self.neighborhood.parse::<NeighborhoodFunction>()?,
            neighborhood_coeff: decimal("neighborhood_coeff", &self.neighborhood_coeff)?,
            initialization: self.initialization.parse::<Initialization>()?,
            radius_initial: self.radius_initial,
            radius_final: self.radius_final,
            radius_cooling: self.radius_cooling.parse::<Cooling>()?,
            rate_initial: decimal("rate_initial", &self.rate_initial)?,
            rate_final: decimal("rate_final", &self.rate_final)?,
            rate_cooling: self.rate_cooling.parse::<Cooling>()?,
            clusters: ClusterCounts {
                initial: self.initial_clusters,
                min: self.min_clusters,
                max: self.max_clusters,
            },
        };

        RunRequest::new(
            &self.workspace,
            RasterSet::parse(&self.rasters)?,
            parameters,
            self.delete_intermediates,
        )
    }
}

/// Decimal parse that names the offending flag
fn decimal(key: &str, raw: &str) -> somflow_core::Result<DecimalText> {
    DecimalText::parse(raw).map_err(|e| match e {
        somflow_core::SomflowError::ParameterInvalid { reason, .. } => {
            somflow_core::SomflowError::ParameterInvalid { key: key.to_string(), reason }
        }
        other => other,
    })
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Workspace directory path (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct InspectConfigArgs {
    /// Path to a SOM.xml document
    pub path: PathBuf,
}
