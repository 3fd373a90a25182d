//! One watched directory

use dirwatch_core::DirectoryEntry;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::mask::EventMask;
use super::record::RawRecord;
use super::source::NotificationSource;
use crate::error::Result;
use crate::event::{DirectoryEvent, DirectoryEventListener, ListenerRef};
use crate::handle::WatchHandle;

/// A kernel watch on one directory and the listeners interested in it
///
/// Keeps the names of the directory's subdirectories, so a removal can be
/// classified after the entry is gone and can no longer be looked up.
/// Dropping the entry releases the kernel watch.
pub struct WatchEntry {
    source: Arc<NotificationSource>,
    path: String,
    handle: WatchHandle,
    listeners: Vec<ListenerRef>,
    known_dirs: HashSet<String>,
}

impl WatchEntry {
    /// Register a kernel watch for `path`, seeding the subdirectory cache
    /// from `listing`
    pub fn new(
        source: Arc<NotificationSource>,
        path: &str,
        host_path: &Path,
        listing: &[DirectoryEntry],
    ) -> Result<Self> {
        let handle = source.add_watch(path, host_path, EventMask::DIRECTORY_WATCH)?;
        Ok(Self::from_handle(source, path, handle, listing))
    }

    /// Take ownership of an already registered kernel watch
    pub fn from_handle(
        source: Arc<NotificationSource>,
        path: &str,
        handle: WatchHandle,
        listing: &[DirectoryEntry],
    ) -> Self {
        let known_dirs: HashSet<String> = listing
            .iter()
            .filter(|e| e.is_dir)
            .map(|e| e.name.clone())
            .collect();

        info!(
            "watching {} (handle {}, {} subdirectories)",
            path,
            handle,
            known_dirs.len()
        );

        Self {
            source,
            path: path.to_string(),
            handle,
            listeners: Vec::new(),
            known_dirs,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handle(&self) -> WatchHandle {
        self.handle
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether `name` is cached as a subdirectory
    pub fn knows_directory(&self, name: &str) -> bool {
        self.known_dirs.contains(name)
    }

    /// Add `listener`; adding the same listener again has no effect
    pub fn add_listener(&mut self, listener: &Arc<dyn DirectoryEventListener>) {
        if !self.listeners.iter().any(|l| l.is(listener)) {
            self.listeners.push(ListenerRef::new(listener));
        }
    }

    /// Remove `listener`; true when no listeners remain
    pub fn remove_listener(&mut self, listener: &Arc<dyn DirectoryEventListener>) -> bool {
        self.listeners.retain(|l| !l.is(listener));
        self.listeners.is_empty()
    }

    /// Classify `record` and notify every listener
    ///
    /// Returns false when the record belongs to another watch or carries
    /// neither a create nor a delete. `fresh_lookup` resolves the record's
    /// name inside this directory; when it finds nothing the kind comes
    /// from the subdirectory cache and the time is 0.
    pub fn handle_record<F>(&mut self, record: &RawRecord, fresh_lookup: F) -> bool
    where
        F: FnOnce(&str) -> Option<DirectoryEntry>,
    {
        if record.handle != self.handle {
            return false;
        }

        let created = record.mask.contains(EventMask::CREATE);
        if !created && !record.mask.contains(EventMask::DELETE) {
            warn!(
                "unsupported event {:?} for {} in {}",
                record.mask,
                record.name_lossy(),
                self.path
            );
            return false;
        }

        let record_name = record.name_lossy().into_owned();
        let (name, is_dir, modified_at) = match fresh_lookup(&record_name) {
            Some(found) => (found.name, found.is_dir, found.modified_at),
            None => {
                let is_dir = self.known_dirs.contains(&record_name);
                (record_name, is_dir, 0)
            }
        };

        let event = if created {
            DirectoryEvent::added(is_dir)
        } else {
            DirectoryEvent::removed(is_dir)
        };

        match event {
            DirectoryEvent::DirectoryAdded => {
                self.known_dirs.insert(name.clone());
            }
            DirectoryEvent::DirectoryRemoved => {
                self.known_dirs.remove(&name);
            }
            _ => {}
        }

        debug!(
            "{} {}/{} to {} listeners",
            event,
            self.path,
            name,
            self.listeners.len()
        );
        for listener in &self.listeners {
            match listener.upgrade() {
                Some(listener) => listener.notify(event, &self.path, &name, modified_at),
                None => warn!("skipping dropped listener on {}", self.path),
            }
        }
        true
    }
}

impl Drop for WatchEntry {
    fn drop(&mut self) {
        match self.source.remove_watch(self.handle) {
            Ok(()) => info!("stopped watching {}", self.path),
            Err(e) => warn!("releasing watch on {}: {}", self.path, e),
        }
    }
}
