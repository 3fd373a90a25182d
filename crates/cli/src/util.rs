//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::config::DaemonConfig;

/// Directory to serve: the flag, then the config, then the working directory
pub fn resolve_root(flag: Option<PathBuf>, config: &DaemonConfig) -> Result<PathBuf> {
    match flag.or_else(|| config.root.clone()) {
        Some(root) => Ok(root),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Directories to stream: the arguments, then the config, then `/`
pub fn resolve_dirs(args: Vec<String>, config: &DaemonConfig) -> Vec<String> {
    if !args.is_empty() {
        args
    } else if !config.watch.is_empty() {
        config.watch.clone()
    } else {
        vec!["/".to_string()]
    }
}

/// Human-readable size
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// UTC `YYYY-MM-DD HH:MM:SS` for a millisecond timestamp; `-` when out of
/// range
pub fn format_mtime(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || "-".to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}
