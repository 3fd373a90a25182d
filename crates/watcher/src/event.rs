//! Listener-facing events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// Classified change reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryEvent {
    /// Acknowledgment that a listener is now registered for a directory
    WatchingDirectory,
    FileAdded,
    FileRemoved,
    DirectoryAdded,
    DirectoryRemoved,
}

impl DirectoryEvent {
    /// Classify a create or delete of an entry
    pub fn added(is_dir: bool) -> Self {
        if is_dir {
            DirectoryEvent::DirectoryAdded
        } else {
            DirectoryEvent::FileAdded
        }
    }

    pub fn removed(is_dir: bool) -> Self {
        if is_dir {
            DirectoryEvent::DirectoryRemoved
        } else {
            DirectoryEvent::FileRemoved
        }
    }
}

impl fmt::Display for DirectoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectoryEvent::WatchingDirectory => "WATCHING_DIRECTORY",
            DirectoryEvent::FileAdded => "FILE_ADDED",
            DirectoryEvent::FileRemoved => "FILE_REMOVED",
            DirectoryEvent::DirectoryAdded => "DIRECTORY_ADDED",
            DirectoryEvent::DirectoryRemoved => "DIRECTORY_REMOVED",
        };
        f.write_str(name)
    }
}

/// Receiver of directory events
///
/// `notify` is called from the engine's polling thread (and, for the
/// `WatchingDirectory` acknowledgment, from the thread calling `watch`)
/// while the engine's watch table is locked. Implementations must not call
/// back into the engine from `notify`.
pub trait DirectoryEventListener: Send + Sync {
    fn notify(
        &self,
        event: DirectoryEvent,
        containing_dir: &str,
        entry_name: &str,
        modified_at: u64,
    );
}

/// Non-owning reference to a registered listener
///
/// Identity is the address of the listener's `Arc` allocation, so the same
/// listener registered twice is stored once.
#[derive(Clone)]
pub(crate) struct ListenerRef(Weak<dyn DirectoryEventListener>);

impl ListenerRef {
    pub(crate) fn new(listener: &Arc<dyn DirectoryEventListener>) -> Self {
        Self(Arc::downgrade(listener))
    }

    pub(crate) fn is(&self, listener: &Arc<dyn DirectoryEventListener>) -> bool {
        self.0.as_ptr() as *const () == Arc::as_ptr(listener) as *const ()
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<dyn DirectoryEventListener>> {
        self.0.upgrade()
    }
}
