//! Notification source: kernel queue plus wakeup channel
//!
//! Registering or removing a kernel watch does not by itself unblock a
//! thread already parked in `poll`, so every change is announced on a
//! wakeup channel: a typed [`WakeSignal`] on a crossbeam channel, followed
//! by one doorbell byte on the self-pipe that `poll` watches.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::kernel::{KernelQueue, LinuxKernelQueue};
use super::mask::EventMask;
use super::record::{aligned_start, decode_records, RawRecord};
use crate::config::MIN_READ_BUFFER;
use crate::error::{RegistrationReason, Result, WatchError};
use crate::handle::WatchHandle;

/// Reason a waiter was woken through the wakeup channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSignal {
    Added,
    Removed,
    Terminate,
}

/// How a [`NotificationSource::wait`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Records are pending on the queue
    Ready,
    TimedOut,
    /// A signal interrupted the wait
    Interrupted,
    /// [`NotificationSource::terminate_wait`] was called
    Terminated,
}

pub struct NotificationSource {
    kernel: Box<dyn KernelQueue>,
    signals_tx: Sender<WakeSignal>,
    signals_rx: Receiver<WakeSignal>,
    closed: AtomicBool,
}

impl NotificationSource {
    /// Open an inotify instance and its wakeup pipe
    pub fn init() -> Result<Self> {
        Ok(Self::with_kernel(Box::new(LinuxKernelQueue::new()?)))
    }

    /// Build on an existing kernel queue
    pub fn with_kernel(kernel: Box<dyn KernelQueue>) -> Self {
        let (signals_tx, signals_rx) = unbounded();
        Self {
            kernel,
            signals_tx,
            signals_rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Register a kernel watch on `host_path`
    ///
    /// `path` is the name the caller knows the directory by; failures are
    /// reported against it.
    pub fn add_watch(&self, path: &str, host_path: &Path, mask: EventMask) -> Result<WatchHandle> {
        let handle = self
            .kernel
            .add_watch(host_path, mask)
            .map_err(|e| WatchError::registration(path, &e))?;

        debug!("kernel watch {} added for {} ({})", handle, path, host_path.display());
        self.signal(WakeSignal::Added);
        Ok(handle)
    }

    pub fn remove_watch(&self, handle: WatchHandle) -> Result<()> {
        self.kernel
            .rm_watch(handle)
            .map_err(|e| WatchError::Unregister {
                handle,
                reason: RegistrationReason::from_io(&e),
            })?;

        debug!("kernel watch {} removed", handle);
        self.signal(WakeSignal::Removed);
        Ok(())
    }

    /// Block until records are pending, the timeout passes, a signal
    /// interrupts, or termination is requested
    ///
    /// Added/removed wakeups are consumed and the wait resumes with the
    /// remaining time. Termination wins over pending records.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let readiness = match self.kernel.poll(remaining) {
                Ok(readiness) => readiness,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    return Ok(WaitOutcome::Interrupted)
                }
                Err(e) => return Err(WatchError::Wait(e)),
            };

            if readiness.wakeup && self.drain_signals() {
                return Ok(WaitOutcome::Terminated);
            }
            if readiness.queue {
                return Ok(WaitOutcome::Ready);
            }
            if !readiness.wakeup {
                return Ok(WaitOutcome::TimedOut);
            }
        }
    }

    /// Read and decode pending records into `buffer`
    ///
    /// `buffer` must hold at least [`MIN_READ_BUFFER`] bytes; its start
    /// need not be aligned. Nothing pending, or a signal during the read,
    /// yields an empty batch.
    pub fn read_records(&self, buffer: &mut [u8]) -> Result<Vec<RawRecord>> {
        if buffer.len() < MIN_READ_BUFFER {
            return Err(WatchError::Read(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "read buffer of {} bytes is below the {} byte minimum",
                    buffer.len(),
                    MIN_READ_BUFFER
                ),
            )));
        }

        let start = aligned_start(buffer);
        let buffer = &mut buffer[start..];

        match self.kernel.read(buffer) {
            Ok(n) => {
                let records = decode_records(&buffer[..n]);
                debug!("read {} bytes, {} records", n, records.len());
                Ok(records)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(WatchError::Read(e)),
        }
    }

    /// Force a blocked [`wait`](Self::wait) to return `Terminated`
    ///
    /// If nobody is waiting, the next wait returns immediately.
    pub fn terminate_wait(&self) {
        self.signal(WakeSignal::Terminate);
    }

    /// Release the kernel queue; later calls do nothing
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.kernel.close().map_err(WatchError::Close)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn signal(&self, signal: WakeSignal) {
        // Message first, then the doorbell, so a woken reader finds it
        if self.signals_tx.send(signal).is_err() {
            return;
        }
        if let Err(e) = self.kernel.wake() {
            warn!("failed to write {:?} wakeup: {}", signal, e);
        }
    }

    /// Consume doorbell bytes, then queued signals; true on termination
    fn drain_signals(&self) -> bool {
        if let Err(e) = self.kernel.drain_wakeups() {
            warn!("failed to drain wakeup channel: {}", e);
        }

        let mut terminate = false;
        for signal in self.signals_rx.try_iter() {
            debug!("wakeup: {:?}", signal);
            terminate |= signal == WakeSignal::Terminate;
        }
        terminate
    }
}

impl Drop for NotificationSource {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}
