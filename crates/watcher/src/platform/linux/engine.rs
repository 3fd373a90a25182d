//! Watch engine: the table of watched directories and its polling thread
//!
//! Callers register listeners per directory with [`WatchEngine::watch`];
//! one kernel watch is shared by every listener of a directory. A
//! background thread waits on the notification source, reads records and
//! routes each to the entry owning its handle. The thread is parked
//! whenever the table is empty.
//!
//! Paths are normalized before use, and a directory reached through two
//! spellings (or a symlink) shares the entry of whichever spelling was
//! registered first; events name that first spelling.
//!
//! Table mutation, the initial `WatchingDirectory` notification and record
//! dispatch all run under the table lock, so a listener always sees its
//! acknowledgment before any other event for the directory. Listeners are
//! called with that lock held and must not call back into the engine.

use dirwatch_core::path::{join, normalize};
use dirwatch_core::FileSystem;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::entry::WatchEntry;
use super::kernel::KernelQueue;
use super::mask::EventMask;
use super::record::RawRecord;
use super::source::{NotificationSource, WaitOutcome};
use crate::config::{WatcherConfig, MIN_READ_BUFFER};
use crate::error::{Result, WatchError};
use crate::event::{DirectoryEvent, DirectoryEventListener};
use crate::handle::WatchHandle;
use crate::worker::BackgroundWorker;

/// Watched directories: one entry per kernel watch, and every normalized
/// path that resolved to it
#[derive(Default)]
struct WatchTable {
    entries: HashMap<WatchHandle, WatchEntry>,
    paths: HashMap<String, WatchHandle>,
}

impl WatchTable {
    fn entry_for(&self, path: &str) -> Option<&WatchEntry> {
        self.paths.get(path).and_then(|handle| self.entries.get(handle))
    }

    /// Drop the entry for `handle` together with every path bound to it
    fn release(&mut self, handle: WatchHandle) -> Option<WatchEntry> {
        self.paths.retain(|_, bound| *bound != handle);
        self.entries.remove(&handle)
    }

    fn dispatch(&mut self, record: &RawRecord, fs: &dyn FileSystem) {
        if record.mask.contains(EventMask::Q_OVERFLOW) {
            warn!("notification queue overflowed, events were lost");
            return;
        }
        if record.mask.contains(EventMask::IGNORED) {
            debug!("kernel released watch {}", record.handle);
            return;
        }

        let Some(entry) = self.entries.get_mut(&record.handle) else {
            debug!(
                "dropping {:?} for {}: no watch with handle {}",
                record.mask,
                record.name_lossy(),
                record.handle
            );
            return;
        };

        let dir = entry.path().to_string();
        if !entry.handle_record(record, |name| fs.lookup(&join(&dir, name))) {
            debug!("dropping {:?} for {} in {}", record.mask, record.name_lossy(), dir);
        }
    }
}

struct EngineShared {
    fs: Arc<dyn FileSystem>,
    source: Arc<NotificationSource>,
    table: Mutex<WatchTable>,
    /// Set while the polling thread is in (or about to enter) `wait`
    in_flight: AtomicBool,
    shutting_down: AtomicBool,
}

impl EngineShared {
    /// One iteration of the polling thread
    fn poll_once(&self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<()> {
        self.in_flight.store(true, Ordering::SeqCst);
        if self.shutting_down.load(Ordering::SeqCst) {
            self.in_flight.store(false, Ordering::SeqCst);
            return Ok(());
        }
        let outcome = self.source.wait(timeout);
        self.in_flight.store(false, Ordering::SeqCst);

        match outcome? {
            WaitOutcome::Ready => {}
            WaitOutcome::TimedOut => return Ok(()),
            WaitOutcome::Interrupted => {
                debug!("wait interrupted by a signal");
                return Ok(());
            }
            WaitOutcome::Terminated => {
                debug!("wait terminated");
                return Ok(());
            }
        }

        let records = self.source.read_records(buffer)?;
        if records.is_empty() {
            return Ok(());
        }

        let mut table = self.table.lock();
        for record in &records {
            table.dispatch(record, self.fs.as_ref());
        }
        Ok(())
    }
}

/// Directory watch engine backed by inotify
pub struct WatchEngine {
    shared: Arc<EngineShared>,
    worker: BackgroundWorker<WatchError>,
}

impl WatchEngine {
    /// Engine over a fresh inotify instance with default configuration
    pub fn new(fs: Arc<dyn FileSystem>) -> Result<Self> {
        Self::with_config(fs, WatcherConfig::default())
    }

    pub fn with_config(fs: Arc<dyn FileSystem>, config: WatcherConfig) -> Result<Self> {
        let source = NotificationSource::init()?;
        Self::with_source(fs, source, config)
    }

    /// Engine over a caller-supplied kernel queue
    pub fn with_kernel(
        fs: Arc<dyn FileSystem>,
        kernel: Box<dyn KernelQueue>,
        config: WatcherConfig,
    ) -> Result<Self> {
        Self::with_source(fs, NotificationSource::with_kernel(kernel), config)
    }

    fn with_source(
        fs: Arc<dyn FileSystem>,
        source: NotificationSource,
        config: WatcherConfig,
    ) -> Result<Self> {
        let shared = Arc::new(EngineShared {
            fs,
            source: Arc::new(source),
            table: Mutex::new(WatchTable::default()),
            in_flight: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        });

        let mut buffer = vec![0u8; config.read_buffer_size.max(MIN_READ_BUFFER)];
        let timeout = config.wait_timeout();
        let iteration_shared = Arc::clone(&shared);
        let worker = BackgroundWorker::spawn(&config.thread_name, true, move || {
            iteration_shared.poll_once(&mut buffer, timeout)
        })
        .map_err(WatchError::Spawn)?;

        Ok(Self { shared, worker })
    }

    /// Register `listener` for changes in the directory at `path`
    ///
    /// The first listener for a directory creates its kernel watch. The
    /// listener is immediately sent `WatchingDirectory` with entry name
    /// `"."`. Fails if the directory cannot be listed or watched, in which
    /// case nothing is registered.
    pub fn watch(&self, path: &str, listener: &Arc<dyn DirectoryEventListener>) -> Result<()> {
        let key = normalize(path);
        let mut table = self.shared.table.lock();
        let was_empty = table.entries.is_empty();

        let (handle, listing) = match table.paths.get(&key) {
            Some(&handle) => (handle, Vec::new()),
            None => {
                let listing = self.shared.fs.list(&key).map_err(|source| WatchError::Listing {
                    path: key.clone(),
                    source,
                })?;
                let handle = self.shared.source.add_watch(
                    &key,
                    &self.shared.fs.host_path(&key),
                    EventMask::DIRECTORY_WATCH,
                )?;
                (handle, listing)
            }
        };

        let WatchTable { entries, paths } = &mut *table;
        let entry = match entries.entry(handle) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => vacant.insert(WatchEntry::from_handle(
                Arc::clone(&self.shared.source),
                &key,
                handle,
                &listing,
            )),
        };
        if paths.insert(key.clone(), handle).is_none() && entry.path() != key {
            info!("{} is the same directory as {} (handle {})", key, entry.path(), handle);
        }

        entry.add_listener(listener);
        listener.notify(DirectoryEvent::WatchingDirectory, &key, ".", 0);
        info!("{} listener(s) on {}", entry.listener_count(), entry.path());

        if was_empty {
            if self.worker.is_stopped() {
                warn!("polling thread has stopped; {} will not report changes", key);
            }
            self.worker.unsuspend();
        }
        Ok(())
    }

    /// Unregister `listener` from `path`
    ///
    /// The last listener leaving releases the kernel watch. Unknown paths
    /// and listeners are ignored.
    pub fn stop_watching(&self, path: &str, listener: &Arc<dyn DirectoryEventListener>) {
        let key = normalize(path);
        let mut table = self.shared.table.lock();

        let Some(&handle) = table.paths.get(&key) else {
            return;
        };
        let Some(entry) = table.entries.get_mut(&handle) else {
            return;
        };
        if !entry.remove_listener(listener) {
            return;
        }

        drop(table.release(handle));
        if table.entries.is_empty() {
            debug!("no directories watched, suspending polling thread");
            self.worker.suspend();
        }
    }

    /// Number of watched directories
    pub fn watch_count(&self) -> usize {
        self.shared.table.lock().entries.len()
    }

    pub fn is_watching(&self, path: &str) -> bool {
        self.shared.table.lock().paths.contains_key(&normalize(path))
    }

    pub fn listener_count(&self, path: &str) -> usize {
        self.shared
            .table
            .lock()
            .entry_for(&normalize(path))
            .map_or(0, WatchEntry::listener_count)
    }

    /// Whether the polling thread is parked
    pub fn is_suspended(&self) -> bool {
        self.worker.is_suspended()
    }

    /// Error that stopped the polling thread, if any
    pub fn take_worker_failure(&self) -> Option<WatchError> {
        self.worker.take_failure()
    }
}

impl Drop for WatchEngine {
    fn drop(&mut self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);

        let released = {
            let mut table = self.shared.table.lock();
            table.paths.clear();
            table.entries.drain().count()
        };
        debug!("released {} watches", released);

        self.worker.stop();
        if self.shared.in_flight.load(Ordering::SeqCst) {
            self.shared.source.terminate_wait();
        }
        self.worker.join();

        if let Err(e) = self.shared.source.close() {
            warn!("{}", e);
        }
    }
}
