//! Check command implementation

use crate::output::OutputWriter;
use crate::output_types::{CheckOutput, ToolEntry};
use anyhow::Result;
use console::style;
use somflow_core::config::LayeredConfig;
use somflow_core::environment::{check_environment, locate_executable, EnvironmentStatus};

pub async fn execute(config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let tools = config.tools();
    let entries: Vec<ToolEntry> = [
        ("lrn_tool", &tools.lrn_tool),
        ("train_tool", &tools.train_tool),
        ("result_tool", &tools.result_tool),
        ("gdalinfo", &tools.gdalinfo),
        ("gdal_calc", &tools.gdal_calc),
    ]
    .into_iter()
    .map(|(name, path)| ToolEntry {
        name: name.to_string(),
        path: path.display().to_string(),
        found: locate_executable(path).is_some(),
    })
    .collect();

    let status = check_environment(&tools).await;

    if output.is_json() {
        output.result(CheckOutput { tools: entries, environment: status.clone() })?;
    } else {
        println!("\n{}", style("somflow Environment Check").bold().underlined());
        println!("{}", style("═".repeat(60)).dim());
        println!();

        for entry in &entries {
            let mark = if entry.found { style("✓").green() } else { style("✗").red() };
            println!("{} {}: {}", mark, entry.name, entry.path);
        }
        for (label, path) in [("group template", &tools.group_template), ("color source", &tools.color_source)] {
            if path.is_file() {
                println!("{} {}: {}", style("✓").green(), label, path.display());
            } else {
                println!("{} {}: {} (not found)", style("⚠").yellow(), label, path.display());
            }
        }
        println!();

        if let EnvironmentStatus::Ok { gdal_version } = &status {
            output.success(format!("Environment ready (GDAL {})", gdal_version));
        }
    }

    status.into_result()?;
    Ok(())
}
