//! Print a directory snapshot

use anyhow::{Context, Result};
use cli_lib::config::DaemonConfig;
use cli_lib::util;
use dirwatch_core::{FileSystem, LocalFileSystem};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(config: &DaemonConfig, root: Option<PathBuf>, dir: &str, json: bool) -> Result<()> {
    let root = util::resolve_root(root, config)?;
    let fs = LocalFileSystem::new(&root)
        .with_context(|| format!("Cannot serve {}", root.display()))?;
    let entries = fs
        .list(dir)
        .with_context(|| format!("Failed to list {}", dir))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            util::format_size(entry.size)
        };
        let name = if entry.is_dir {
            format!("{}/", entry.name).blue().bold().to_string()
        } else {
            entry.name.clone()
        };
        println!(
            "{}  {:>10}  {}",
            util::format_mtime(entry.modified_at).dimmed(),
            size,
            name
        );
    }
    println!("{}", format!("{} entries", entries.len()).dimmed());
    Ok(())
}
