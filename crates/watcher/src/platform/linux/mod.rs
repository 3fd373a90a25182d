//! inotify watch engine

pub mod engine;
pub mod entry;
pub mod kernel;
pub mod mask;
pub mod record;
pub mod source;

pub use engine::WatchEngine;
pub use entry::WatchEntry;
pub use kernel::{KernelQueue, LinuxKernelQueue, Readiness};
pub use mask::EventMask;
pub use record::RawRecord;
pub use source::{NotificationSource, WaitOutcome, WakeSignal};
