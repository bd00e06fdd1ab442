//! Inspect-config command implementation

use crate::cli::InspectConfigArgs;
use crate::errors::{CliError, EXIT_INVALID_INPUT};
use crate::output::OutputWriter;
use anyhow::Result;
use somflow_core::som_xml::read_configuration;

pub fn execute(args: InspectConfigArgs, output: &OutputWriter) -> Result<()> {
    if !args.path.is_file() {
        return Err(CliError::new("SOM configuration document not found")
            .with_context(format!("Path: {}", args.path.display()))
            .with_suggestion("The document is written to <workspace>/SOM.xml by `somflow run`")
            .with_exit_code(EXIT_INVALID_INPUT)
            .into());
    }

    let cfg = read_configuration(&args.path)?;

    if output.is_json() {
        output.result(&cfg)?;
        return Ok(());
    }

    let p = &cfg.parameters;
    output.section("Files");
    output.kv("Training set", cfg.files.training_set.display());
    output.kv("SOM-space export", cfg.files.somspace_export.display());
    output.kv("Geo-space export", cfg.files.geospace_export.display());
    output.kv("Output folder", cfg.files.output_dir.display());

    output.section("Map");
    output.kv("Grid", format!("{} x {} ({}, {})", p.grid_width, p.grid_height, p.grid_shape, p.topology));
    output.kv("Epochs", p.epochs);
    output.kv("Initialization", p.initialization);
    output.kv("Neighborhood", format!("{} (coefficient {})", p.neighborhood, p.neighborhood_coeff));
    output.kv("Radius", format!("{} → {} ({})", p.radius_initial, p.radius_final, p.radius_cooling));
    output.kv("Learning rate", format!("{} → {} ({})", p.rate_initial, p.rate_final, p.rate_cooling));

    output.section("k-means");
    output.kv(
        "Clusters",
        format!("{} initial, {} to {}", p.clusters.initial, p.clusters.min, p.clusters.max),
    );

    Ok(())
}
