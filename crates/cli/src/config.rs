//! Daemon configuration
//!
//! Read from `--config <file>` or `<config dir>/dirwatch/config.toml`.
//! A missing file means defaults; every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use watcher::{WatcherConfig, WatcherConfigError};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown log level '{0}' (expected one of error, warn, info, debug, trace)")]
    LogLevel(String),

    #[error("watch entry '{0}' must start with '/'")]
    RelativeWatch(String),

    #[error("[watcher] {0}")]
    Watcher(#[from] WatcherConfigError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory served as `/`; the working directory when unset
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directories streamed when `watch` is given none
    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write every log line to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::LogLevel(self.log.level.clone()));
        }
        if let Some(dir) = self.watch.iter().find(|d| !d.starts_with('/')) {
            return Err(ConfigError::RelativeWatch(dir.clone()));
        }
        Ok(self.watcher.validate()?)
    }
}

/// Default location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dirwatch").join("config.toml"))
}

/// Load and validate the config at `explicit`, or at the default location
///
/// An explicitly named file must exist; the default one may be absent.
pub fn load(explicit: Option<&Path>) -> Result<DaemonConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(DaemonConfig::default()),
        },
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Parse and validate config text
pub fn parse(text: &str) -> Result<DaemonConfig> {
    let config: DaemonConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Commented example configuration
pub fn example_config() -> &'static str {
    r#"# Dirwatch configuration

# Directory served as "/" (default: current directory)
# root = "/srv/share"

# Directories streamed by `dirwatch watch` when none are given
watch = ["/"]

[log]
# error, warn, info, debug or trace; RUST_LOG takes precedence
level = "warn"
# Copy every log line to a file
# file = "/var/log/dirwatch.log"

[watcher]
# Upper bound on one wait in milliseconds, 0 = block until something happens
wait_timeout_ms = 0
# Bytes read from the kernel queue at once (at least 276)
read_buffer_size = 4416
thread_name = "dirwatch-poll"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_parses() {
        let config = parse(example_config()).unwrap();
        assert_eq!(config.watch, vec!["/".to_string()]);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.watcher, WatcherConfig::default());
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(parse("").unwrap(), DaemonConfig::default());
    }

    #[test]
    fn test_validation() {
        let err = parse("[log]\nlevel = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("loud"));

        let err = parse("watch = [\"relative\"]").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::RelativeWatch("relative".to_string()))
        );

        let err = parse("[watcher]\nread_buffer_size = 8").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Watcher(WatcherConfigError::BufferTooSmall { size: 8, .. }))
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "root = \"/tmp\"\n[log]\nlevel = \"DEBUG\"").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.root.as_deref(), Some(Path::new("/tmp")));
        assert_eq!(config.log.level, "DEBUG");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(load(Some(Path::new("/no/such/dirwatch.toml"))).is_err());
    }
}
