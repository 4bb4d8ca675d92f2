use colored::Colorize;
use stackup_config::StackConfig;
use std::path::{Path, PathBuf};

/// Load configuration and apply command-line overrides
pub fn load_config(
    region: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<(StackConfig, Option<PathBuf>)> {
    let (mut config, file) = StackConfig::load()?;

    if let Some(region) = region {
        config.region = region;
    }
    if let Some(output) = output {
        config.output_path = output;
    }
    config.validate()?;

    Ok((config, file))
}

/// Print which configuration file was used
pub fn print_config_source(file: Option<&Path>) {
    match file {
        Some(path) => println!("Configuration: {}", path.display().to_string().cyan()),
        None => println!("Configuration: {}", "built-in defaults".dimmed()),
    }
}
