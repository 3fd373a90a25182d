//! Kernel notification facility
//!
//! [`KernelQueue`] is the narrow set of calls the notification source
//! makes into the OS. [`LinuxKernelQueue`] performs them against a real
//! inotify instance and a self-pipe; `testing::FakeKernel` stands in for
//! it in tests.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use super::mask::EventMask;
use crate::error::{InitReason, WatchError};
use crate::handle::WatchHandle;

/// Which descriptors a poll found ready
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Notification records are pending
    pub queue: bool,
    /// A wakeup byte is pending on the self-pipe
    pub wakeup: bool,
}

impl Readiness {
    pub fn any(self) -> bool {
        self.queue || self.wakeup
    }
}

/// Calls into the kernel notification facility
pub trait KernelQueue: Send + Sync {
    /// Register `path` for `mask`; watching the same inode again returns
    /// the existing handle
    fn add_watch(&self, path: &Path, mask: EventMask) -> io::Result<WatchHandle>;

    fn rm_watch(&self, handle: WatchHandle) -> io::Result<()>;

    /// Block until the queue or the wakeup pipe is readable, or `timeout`
    /// passes (`None` blocks indefinitely)
    ///
    /// Signal interruption surfaces as `ErrorKind::Interrupted`.
    fn poll(&self, timeout: Option<Duration>) -> io::Result<Readiness>;

    /// One raw read of pending record bytes; `WouldBlock` when none
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Put one byte on the wakeup pipe
    fn wake(&self) -> io::Result<()>;

    /// Discard every pending wakeup byte
    fn drain_wakeups(&self) -> io::Result<()>;

    /// Release the queue handle
    fn close(&self) -> io::Result<()>;
}

/// inotify instance plus self-pipe
pub struct LinuxKernelQueue {
    /// inotify descriptor, -1 once closed
    inotify: AtomicI32,
    wake_read: OwnedFd,
    wake_write: OwnedFd,
}

impl LinuxKernelQueue {
    /// Create the inotify instance and the wakeup pipe, both non-blocking
    /// and close-on-exec
    pub fn new() -> Result<Self, WatchError> {
        // SAFETY: plain syscall, no pointers involved
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC | libc::IN_NONBLOCK) };
        if fd < 0 {
            return Err(WatchError::Init(InitReason::from_queue_errno(last_errno())));
        }

        let mut ends: [libc::c_int; 2] = [-1, -1];
        // SAFETY: `ends` has room for the two descriptors pipe2 writes
        let rc = unsafe { libc::pipe2(ends.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        if rc < 0 {
            let errno = last_errno();
            // SAFETY: `fd` was returned by inotify_init1 above and is not shared
            unsafe { libc::close(fd) };
            return Err(WatchError::Init(InitReason::from_channel_errno(errno)));
        }

        // SAFETY: pipe2 succeeded, so both descriptors are open and owned here
        let (wake_read, wake_write) =
            unsafe { (OwnedFd::from_raw_fd(ends[0]), OwnedFd::from_raw_fd(ends[1])) };

        Ok(Self {
            inotify: AtomicI32::new(fd),
            wake_read,
            wake_write,
        })
    }

    fn queue_fd(&self) -> io::Result<RawFd> {
        match self.inotify.load(Ordering::SeqCst) {
            fd if fd >= 0 => Ok(fd),
            _ => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }
}

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => {
            // Round up so a sub-millisecond remainder still waits
            let ms = t.as_micros().div_ceil(1000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

fn readable(revents: libc::c_short) -> bool {
    revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
}

impl KernelQueue for LinuxKernelQueue {
    fn add_watch(&self, path: &Path, mask: EventMask) -> io::Result<WatchHandle> {
        let fd = self.queue_fd()?;
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;

        // SAFETY: `c_path` is a valid NUL-terminated string for the call
        let wd = unsafe { libc::inotify_add_watch(fd, c_path.as_ptr(), mask.bits()) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WatchHandle::from_raw(wd))
    }

    fn rm_watch(&self, handle: WatchHandle) -> io::Result<()> {
        let fd = self.queue_fd()?;
        // SAFETY: plain syscall, no pointers involved
        if unsafe { libc::inotify_rm_watch(fd, handle.as_raw()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn poll(&self, timeout: Option<Duration>) -> io::Result<Readiness> {
        let mut fds = [
            libc::pollfd {
                fd: self.inotify.load(Ordering::SeqCst),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.wake_read.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        // SAFETY: `fds` is a live array of two pollfd structs
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms(timeout)) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Readiness {
            queue: readable(fds[0].revents),
            wakeup: readable(fds[1].revents),
        })
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let fd = self.queue_fd()?;
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn wake(&self) -> io::Result<()> {
        let byte = [1u8];
        loop {
            // SAFETY: `byte` is valid for reads of one byte
            let n = unsafe { libc::write(self.wake_write.as_raw_fd(), byte.as_ptr().cast(), 1) };
            if n >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                // A full pipe already guarantees the reader wakes
                io::ErrorKind::WouldBlock => return Ok(()),
                _ => return Err(err),
            }
        }
    }

    fn drain_wakeups(&self) -> io::Result<()> {
        let mut scratch = [0u8; 64];
        loop {
            // SAFETY: `scratch` is valid for writes of its length
            let n = unsafe {
                libc::read(
                    self.wake_read.as_raw_fd(),
                    scratch.as_mut_ptr().cast(),
                    scratch.len(),
                )
            };
            if n > 0 {
                continue;
            }
            if n == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(()),
                _ => return Err(err),
            }
        }
    }

    fn close(&self) -> io::Result<()> {
        let fd = self.inotify.swap(-1, Ordering::SeqCst);
        if fd < 0 {
            return Ok(());
        }
        // SAFETY: the swap above handed sole ownership of `fd` to this call
        if unsafe { libc::close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for LinuxKernelQueue {
    fn drop(&mut self) {
        let fd = self.inotify.swap(-1, Ordering::SeqCst);
        if fd >= 0 {
            // SAFETY: still owned, nobody else can observe it after the swap
            unsafe { libc::close(fd) };
        }
    }
}
