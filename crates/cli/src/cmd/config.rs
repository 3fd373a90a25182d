//! Configuration inspection command

use anyhow::{Context, Result};
use cli_lib::config::{self, DaemonConfig};
use owo_colors::OwoColorize;

/// Show where the config file is read from
pub async fn run_path() -> Result<()> {
    let path = config::config_file_path().context("Could not determine config file path")?;
    println!("{}", path.display());
    if !path.exists() {
        println!(
            "{}",
            "File does not exist; defaults are used. See `dirwatch config example`.".yellow()
        );
    }
    Ok(())
}

/// Print a commented example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Print the effective configuration
pub async fn run_show(config: &DaemonConfig) -> Result<()> {
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", text);
    Ok(())
}
