//! Error types for the directory watch engine.

use dirwatch_core::FsError;
use std::fmt;
use std::io;
use thiserror::Error;

use crate::handle::WatchHandle;

/// Errors from watch engine operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Could not initialize the notification source: {0}")]
    Init(InitReason),

    #[error("{path} error: {reason}")]
    Registration {
        path: String,
        reason: RegistrationReason,
    },

    #[error("Could not remove watch {handle}: {reason}")]
    Unregister {
        handle: WatchHandle,
        reason: RegistrationReason,
    },

    #[error("{path} error: listing failed: {source}")]
    Listing {
        path: String,
        #[source]
        source: FsError,
    },

    #[error("Waiting for notifications failed: {0}")]
    Wait(#[source] io::Error),

    #[error("Reading notification records failed: {0}")]
    Read(#[source] io::Error),

    #[error("Closing the notification source failed: {0}")]
    Close(#[source] io::Error),

    #[error("Could not start the polling thread: {0}")]
    Spawn(#[source] io::Error),
}

impl WatchError {
    /// Attach a watched path to a registration failure
    pub(crate) fn registration(path: &str, err: &io::Error) -> Self {
        WatchError::Registration {
            path: path.to_string(),
            reason: RegistrationReason::from_io(err),
        }
    }
}

/// Why the kernel queue or its wakeup channel could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitReason {
    /// Kernel limit on queues, per-process descriptors, or kernel memory
    ResourceExhausted,
    /// System-wide limit on open files
    TooManyOpenFiles,
    Unknown(i32),
}

impl InitReason {
    /// Decode the errno of a failed `inotify_init1`
    pub fn from_queue_errno(errno: i32) -> Self {
        match errno {
            libc::EMFILE | libc::ENOMEM => InitReason::ResourceExhausted,
            libc::ENFILE => InitReason::TooManyOpenFiles,
            other => InitReason::Unknown(other),
        }
    }

    /// Decode the errno of a failed `pipe2`
    pub fn from_channel_errno(errno: i32) -> Self {
        match errno {
            libc::EMFILE | libc::ENFILE => InitReason::TooManyOpenFiles,
            libc::ENOMEM => InitReason::ResourceExhausted,
            other => InitReason::Unknown(other),
        }
    }
}

impl fmt::Display for InitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitReason::ResourceExhausted => write!(
                f,
                "too many inotify instances, open descriptors, or not enough kernel memory"
            ),
            InitReason::TooManyOpenFiles => write!(f, "too many open files"),
            InitReason::Unknown(code) => write!(f, "unknown error code [{}]", code),
        }
    }
}

/// Decoded reason for a failed watch registration or removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationReason {
    /// EACCES
    PermissionDenied,
    /// EBADF
    InvalidHandle,
    /// EFAULT
    OutOfAddressSpace,
    /// EINVAL
    InvalidMask,
    /// ENAMETOOLONG
    NameTooLong,
    /// ENOENT
    PathNotFound,
    /// ENOMEM
    OutOfMemory,
    /// ENOSPC
    WatchLimitExceeded,
    /// ENOTDIR
    NotADirectory,
    /// EEXIST
    AlreadyWatched,
    Unknown(i32),
}

impl RegistrationReason {
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::EACCES => RegistrationReason::PermissionDenied,
            libc::EBADF => RegistrationReason::InvalidHandle,
            libc::EFAULT => RegistrationReason::OutOfAddressSpace,
            libc::EINVAL => RegistrationReason::InvalidMask,
            libc::ENAMETOOLONG => RegistrationReason::NameTooLong,
            libc::ENOENT => RegistrationReason::PathNotFound,
            libc::ENOMEM => RegistrationReason::OutOfMemory,
            libc::ENOSPC => RegistrationReason::WatchLimitExceeded,
            libc::ENOTDIR => RegistrationReason::NotADirectory,
            libc::EEXIST => RegistrationReason::AlreadyWatched,
            other => RegistrationReason::Unknown(other),
        }
    }

    /// Decode an I/O error; errors without an OS code count as unknown
    pub fn from_io(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::from_errno(errno),
            None => RegistrationReason::Unknown(-1),
        }
    }
}

impl fmt::Display for RegistrationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationReason::PermissionDenied => {
                write!(f, "Read access to the directory is not permitted [EACCES].")
            }
            RegistrationReason::InvalidHandle => {
                write!(f, "The notification queue handle is not valid [EBADF].")
            }
            RegistrationReason::OutOfAddressSpace => write!(
                f,
                "The path points outside of the accessible address space [EFAULT]."
            ),
            RegistrationReason::InvalidMask => write!(
                f,
                "The event mask contains no valid events, or the handle is not a notification queue [EINVAL]."
            ),
            RegistrationReason::NameTooLong => write!(f, "The path is too long [ENAMETOOLONG]."),
            RegistrationReason::PathNotFound => write!(
                f,
                "A directory component of the path does not exist or is a dangling symbolic link [ENOENT]."
            ),
            RegistrationReason::OutOfMemory => {
                write!(f, "Insufficient kernel memory was available [ENOMEM].")
            }
            RegistrationReason::WatchLimitExceeded => write!(
                f,
                "The user limit on the total number of watches was reached [ENOSPC]."
            ),
            RegistrationReason::NotADirectory => {
                write!(f, "The path is not a directory [ENOTDIR].")
            }
            RegistrationReason::AlreadyWatched => {
                write!(f, "The path is already watched by this queue [EEXIST].")
            }
            RegistrationReason::Unknown(code) => write!(f, "Unknown error code [{}].", code),
        }
    }
}

/// Result type for watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
