//! Directory watching for Dirwatch
//!
//! This crate turns kernel change notifications into per-directory events:
//! - One kernel watch per directory, shared by all of its listeners
//! - Added/removed classification for files and subdirectories
//! - A suspendable polling thread, parked while nothing is watched
//! - Bounded-time shutdown through a self-pipe wakeup
//!
//! The engine itself is Linux-only (inotify); the worker, error, event and
//! configuration types build everywhere.

pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod platform;
pub mod worker;

#[cfg(target_os = "linux")]
pub mod testing;

pub use config::{WatcherConfig, WatcherConfigError, MIN_READ_BUFFER};
pub use error::{InitReason, RegistrationReason, Result, WatchError};
pub use event::{DirectoryEvent, DirectoryEventListener};
pub use handle::WatchHandle;
pub use worker::{BackgroundWorker, WorkerState};

#[cfg(target_os = "linux")]
pub use platform::linux::{
    EventMask, KernelQueue, LinuxKernelQueue, NotificationSource, RawRecord, Readiness,
    WaitOutcome, WakeSignal, WatchEngine, WatchEntry,
};
