//! Watch engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Smallest read buffer that holds one maximum-length record: the 16-byte
/// record header, a 255-byte name plus terminator, and 4 bytes of
/// alignment slack.
pub const MIN_READ_BUFFER: usize = 16 + 255 + 1 + 4;

const MAX_READ_BUFFER: usize = 16 * 1024 * 1024;
const MAX_WAIT_TIMEOUT_MS: u64 = 3_600_000;

/// A configuration value out of range
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatcherConfigError {
    #[error("read_buffer_size must be at least {min} bytes (got {size})")]
    BufferTooSmall { size: usize, min: usize },

    #[error("read_buffer_size must be at most {max} bytes (got {size})")]
    BufferTooLarge { size: usize, max: usize },

    #[error("wait_timeout_ms must be at most {max} (got {ms})")]
    TimeoutTooLong { ms: u64, max: u64 },

    #[error("thread_name must not be empty")]
    EmptyThreadName,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Upper bound on a single wait, in milliseconds (0 = wait indefinitely)
    ///
    /// A bound lets a suspend take effect even while no events arrive.
    #[serde(default)]
    pub wait_timeout_ms: u64,

    /// Bytes read from the kernel queue per iteration
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Name of the polling thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl WatcherConfig {
    /// Wait bound, or `None` to block until something happens
    pub fn wait_timeout(&self) -> Option<Duration> {
        if self.wait_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.wait_timeout_ms))
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), WatcherConfigError> {
        if self.read_buffer_size < MIN_READ_BUFFER {
            return Err(WatcherConfigError::BufferTooSmall {
                size: self.read_buffer_size,
                min: MIN_READ_BUFFER,
            });
        }
        if self.read_buffer_size > MAX_READ_BUFFER {
            return Err(WatcherConfigError::BufferTooLarge {
                size: self.read_buffer_size,
                max: MAX_READ_BUFFER,
            });
        }
        if self.wait_timeout_ms > MAX_WAIT_TIMEOUT_MS {
            return Err(WatcherConfigError::TimeoutTooLong {
                ms: self.wait_timeout_ms,
                max: MAX_WAIT_TIMEOUT_MS,
            });
        }
        if self.thread_name.is_empty() {
            return Err(WatcherConfigError::EmptyThreadName);
        }
        Ok(())
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 0,
            read_buffer_size: default_read_buffer_size(),
            thread_name: default_thread_name(),
        }
    }
}

fn default_read_buffer_size() -> usize {
    16 * MIN_READ_BUFFER
}

fn default_thread_name() -> String {
    "dirwatch-poll".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wait_timeout(), None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WatcherConfig = toml::from_str("wait_timeout_ms = 250").unwrap();
        assert_eq!(config.wait_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.read_buffer_size, 16 * MIN_READ_BUFFER);
        assert_eq!(config.thread_name, "dirwatch-poll");
    }

    #[test]
    fn test_rejects_small_buffer() {
        let config = WatcherConfig {
            read_buffer_size: MIN_READ_BUFFER - 1,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(WatcherConfigError::BufferTooSmall {
                size: MIN_READ_BUFFER - 1,
                min: MIN_READ_BUFFER,
            })
        );
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = WatcherConfig {
            wait_timeout_ms: 3_600_001,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WatcherConfigError::TimeoutTooLong { ms: 3_600_001, .. })
        ));

        let config = WatcherConfig {
            read_buffer_size: 32 * 1024 * 1024,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WatcherConfigError::BufferTooLarge { .. })
        ));

        let config = WatcherConfig {
            thread_name: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err, WatcherConfigError::EmptyThreadName);
        assert_eq!(err.to_string(), "thread_name must not be empty");
    }
}
