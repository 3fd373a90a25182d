//! Platform-specific watch engine implementations
//!
//! Only the Linux inotify engine exists. Another platform would provide the
//! same `WatchEngine` contract against its own notification primitive.

#[cfg(target_os = "linux")]
pub mod linux;
