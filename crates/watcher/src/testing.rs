//! Test doubles for driving the engine without a real kernel queue
//!
//! [`FakeKernel`] implements [`KernelQueue`] in memory: watches are kept in
//! a list (the handle is the index), injected records are encoded in the
//! kernel's binary layout, and `poll` blocks on a condition variable until
//! records or wakeups arrive. Clones share state, so a test keeps one clone
//! and hands another to the engine.
//!
//! [`RecordingListener`] collects every notification it receives.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::event::{DirectoryEvent, DirectoryEventListener};
use crate::handle::WatchHandle;
use crate::platform::linux::kernel::{KernelQueue, Readiness};
use crate::platform::linux::mask::EventMask;
use crate::platform::linux::record::{RawRecord, HEADER_LEN};

/// A watch registered with a [`FakeKernel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeWatch {
    pub path: PathBuf,
    pub mask: EventMask,
    pub active: bool,
}

#[derive(Default)]
struct FakeState {
    watches: Vec<FakeWatch>,
    pending: Vec<u8>,
    doorbells: usize,
    wakes: usize,
    pollers: usize,
    add_failures: HashMap<PathBuf, i32>,
    links: HashMap<PathBuf, PathBuf>,
    read_failure: Option<i32>,
    close_failure: Option<i32>,
    closes: usize,
}

impl FakeState {
    fn resolve<'a>(&'a self, path: &'a Path) -> &'a Path {
        self.links.get(path).map_or(path, PathBuf::as_path)
    }

    fn active_handle(&self, path: &Path) -> Option<WatchHandle> {
        self.watches
            .iter()
            .position(|w| w.active && w.path == path)
            .map(|i| WatchHandle::from_raw(i as i32))
    }
}

/// In-memory [`KernelQueue`]
#[derive(Clone, Default)]
pub struct FakeKernel {
    inner: Arc<(Mutex<FakeState>, Condvar)>,
}

impl FakeKernel {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let (state, changed) = &*self.inner;
        let result = f(&mut state.lock());
        changed.notify_all();
        result
    }

    /// Make every later `add_watch` of `path` fail with `errno`
    pub fn fail_add_watch(&self, path: impl AsRef<Path>, errno: i32) {
        let path = path.as_ref().to_path_buf();
        self.with_state(|s| s.add_failures.insert(path, errno));
    }

    /// Make `alias` resolve to `target`, like a symlink to a directory
    pub fn link(&self, alias: impl AsRef<Path>, target: impl AsRef<Path>) {
        let (alias, target) = (alias.as_ref().to_path_buf(), target.as_ref().to_path_buf());
        self.with_state(|s| s.links.insert(alias, target));
    }

    /// Make the next `read` fail with `errno`
    pub fn fail_next_read(&self, errno: i32) {
        self.with_state(|s| s.read_failure = Some(errno));
    }

    /// Make `close` fail with `errno`
    pub fn fail_close(&self, errno: i32) {
        self.with_state(|s| s.close_failure = Some(errno));
    }

    /// Every watch ever registered, in handle order
    pub fn watches(&self) -> Vec<FakeWatch> {
        self.with_state(|s| s.watches.clone())
    }

    pub fn active_watches(&self) -> usize {
        self.with_state(|s| s.watches.iter().filter(|w| w.active).count())
    }

    /// Handle of the active watch on `path`
    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.with_state(|s| s.active_handle(path))
    }

    /// Queue a record as if the kernel produced it
    pub fn push_record(&self, record: &RawRecord) {
        self.with_state(|s| record.encode_into(&mut s.pending));
    }

    /// Queue a create of `name` in the watched directory `dir`; false if
    /// `dir` is not watched
    pub fn push_created(&self, dir: &Path, name: &str) -> bool {
        self.push_for(dir, EventMask::CREATE, name)
    }

    /// Queue a delete of `name` in the watched directory `dir`; false if
    /// `dir` is not watched
    pub fn push_deleted(&self, dir: &Path, name: &str) -> bool {
        self.push_for(dir, EventMask::DELETE, name)
    }

    fn push_for(&self, dir: &Path, mask: EventMask, name: &str) -> bool {
        self.with_state(|s| match s.active_handle(dir) {
            Some(handle) => {
                RawRecord::new(handle, mask, 0, name).encode_into(&mut s.pending);
                true
            }
            None => false,
        })
    }

    /// Bytes of records not yet read
    pub fn pending_bytes(&self) -> usize {
        self.with_state(|s| s.pending.len())
    }

    /// Number of wakeups written so far
    pub fn wake_count(&self) -> usize {
        self.with_state(|s| s.wakes)
    }

    pub fn close_count(&self) -> usize {
        self.with_state(|s| s.closes)
    }

    /// Wait until some thread is blocked in `poll`
    pub fn wait_for_poller(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (state, changed) = &*self.inner;
        let mut state = state.lock();
        while state.pollers == 0 {
            if changed.wait_until(&mut state, deadline).timed_out() {
                return state.pollers > 0;
            }
        }
        true
    }
}

impl KernelQueue for FakeKernel {
    fn add_watch(&self, path: &Path, mask: EventMask) -> io::Result<WatchHandle> {
        self.with_state(|s| {
            if s.closes > 0 {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            if let Some(&errno) = s.add_failures.get(path) {
                return Err(io::Error::from_raw_os_error(errno));
            }
            let path = s.resolve(path).to_path_buf();
            if let Some(handle) = s.active_handle(&path) {
                s.watches[handle.as_raw() as usize].mask = mask;
                return Ok(handle);
            }
            s.watches.push(FakeWatch {
                path,
                mask,
                active: true,
            });
            Ok(WatchHandle::from_raw(s.watches.len() as i32 - 1))
        })
    }

    fn rm_watch(&self, handle: WatchHandle) -> io::Result<()> {
        self.with_state(|s| {
            let watch = usize::try_from(handle.as_raw())
                .ok()
                .and_then(|i| s.watches.get_mut(i))
                .filter(|w| w.active)
                .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))?;
            watch.active = false;
            RawRecord::new(handle, EventMask::IGNORED, 0, "").encode_into(&mut s.pending);
            Ok(())
        })
    }

    fn poll(&self, timeout: Option<Duration>) -> io::Result<Readiness> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let (state, changed) = &*self.inner;
        let mut state = state.lock();

        state.pollers += 1;
        changed.notify_all();
        while state.pending.is_empty() && state.doorbells == 0 {
            match deadline {
                Some(deadline) => {
                    if changed.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => changed.wait(&mut state),
            }
        }
        state.pollers -= 1;

        Ok(Readiness {
            queue: !state.pending.is_empty(),
            wakeup: state.doorbells > 0,
        })
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_state(|s| {
            if let Some(errno) = s.read_failure.take() {
                return Err(io::Error::from_raw_os_error(errno));
            }
            if s.pending.is_empty() {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }

            // Whole records only, like the kernel
            let mut taken = 0;
            while taken + HEADER_LEN <= s.pending.len() {
                let mut len = [0u8; 4];
                len.copy_from_slice(&s.pending[taken + 12..taken + 16]);
                let size = HEADER_LEN + u32::from_ne_bytes(len) as usize;
                if taken + size > buf.len() {
                    break;
                }
                taken += size;
            }
            if taken == 0 {
                return Err(io::Error::from_raw_os_error(libc::EINVAL));
            }

            buf[..taken].copy_from_slice(&s.pending[..taken]);
            s.pending.drain(..taken);
            Ok(taken)
        })
    }

    fn wake(&self) -> io::Result<()> {
        self.with_state(|s| {
            s.doorbells += 1;
            s.wakes += 1;
        });
        Ok(())
    }

    fn drain_wakeups(&self) -> io::Result<()> {
        self.with_state(|s| s.doorbells = 0);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.with_state(|s| {
            s.closes += 1;
            match s.close_failure {
                Some(errno) => Err(io::Error::from_raw_os_error(errno)),
                None => Ok(()),
            }
        })
    }
}

/// One notification seen by a [`RecordingListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event: DirectoryEvent,
    pub dir: String,
    pub name: String,
    pub modified_at: u64,
}

impl RecordedEvent {
    pub fn new(event: DirectoryEvent, dir: &str, name: &str, modified_at: u64) -> Self {
        Self {
            event,
            dir: dir.to_string(),
            name: name.to_string(),
            modified_at,
        }
    }
}

/// Listener that records every notification
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
    tx: Sender<RecordedEvent>,
    rx: Receiver<RecordedEvent>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = unbounded();
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            tx,
            rx,
        })
    }

    /// The same listener as a trait object, for `watch`/`stop_watching`
    pub fn as_listener(self: &Arc<Self>) -> Arc<dyn DirectoryEventListener> {
        Arc::clone(self) as Arc<dyn DirectoryEventListener>
    }

    /// Everything received so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Next notification not yet taken by `recv_timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RecordedEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl DirectoryEventListener for RecordingListener {
    fn notify(&self, event: DirectoryEvent, containing_dir: &str, entry_name: &str, modified_at: u64) {
        let recorded = RecordedEvent::new(event, containing_dir, entry_name, modified_at);
        self.events.lock().push(recorded.clone());
        let _ = self.tx.send(recorded);
    }
}
