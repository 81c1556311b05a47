//! Directory change tracking
//!
//! Accumulates raw filesystem notifications into a normalized, resettable
//! change set per watched root, and summarizes drained changes into the
//! polling response. Filesystem notifications are lossy for renames and
//! deletions of whole subtrees, so the summary falls back to an explicit
//! full-resync signal whenever a change cannot be expressed precisely.

use crate::error::StorageError;
use crate::hashes::{hash_source, DELETED_HASH};
use crate::manifest::Manifest;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extensions recognized as script artifacts.
pub const SCRIPT_EXTENSIONS: &[&str] = &["lua", "luau"];

/// What kind of filesystem entry a notification referred to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    File,
    Directory,
    /// The notification did not say (renames, metadata-only events).
    Unknown,
}

/// A normalized pending change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Accumulated state between drains.
///
/// The resync flag is kept outside the entry map so no later path event can
/// overwrite the lost-events signal.
#[derive(Default)]
struct PendingChanges {
    resync: bool,
    entries: HashMap<PathBuf, ChangeKind>,
}

/// One atomically drained batch of pending changes
pub struct DrainedChanges {
    /// The notification stream lost events (for example an OS buffer
    /// overflow) since the previous drain; the entries are not trustworthy.
    pub resync: bool,
    pub entries: Vec<ChangeEntry>,
}

/// Watches one directory tree and accumulates changed paths
///
/// Later events for the same path overwrite the recorded kind; the set is
/// cleared only by [`DirectoryWatcher::drain_and_reset`]. Notifications
/// arriving during a drain land in the next drain rather than being lost.
pub struct DirectoryWatcher {
    root: PathBuf,
    pending: Arc<Mutex<PendingChanges>>,
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching `root` recursively.
    pub fn new(root: PathBuf) -> Result<Self, StorageError> {
        let pending = Arc::new(Mutex::new(PendingChanges::default()));
        let sink = Arc::clone(&pending);
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => record_event(&sink, event),
                Err(e) => {
                    warn!("Watch error, forcing resync: {}", e);
                    sink.lock().resync = true;
                }
            }
        })
        .map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to create watcher: {}", e),
            ))
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to watch directory {:?}: {}", root, e),
                ))
            })?;

        debug!(root = ?root, "Started directory watcher");
        Ok(Self {
            root,
            pending,
            _watcher: watcher,
        })
    }

    /// The canonical root this watcher covers.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Atomically take all pending entries and clear both the entry map and
    /// the resync flag.
    pub fn drain_and_reset(&self) -> DrainedChanges {
        let mut pending = self.pending.lock();
        let resync = std::mem::take(&mut pending.resync);
        let entries = pending
            .entries
            .drain()
            .map(|(path, kind)| ChangeEntry { path, kind })
            .collect();
        DrainedChanges { resync, entries }
    }

    /// Put an entry back so it is retried on a later drain. A notification
    /// that arrived for the path in the meantime wins over the stale entry.
    pub fn requeue(&self, entry: ChangeEntry) {
        self.pending
            .lock()
            .entries
            .entry(entry.path)
            .or_insert(entry.kind);
    }

    #[cfg(test)]
    fn insert(&self, path: PathBuf, kind: ChangeKind) {
        self.pending.lock().entries.insert(path, kind);
    }

    #[cfg(test)]
    fn mark_resync(&self) {
        self.pending.lock().resync = true;
    }
}

/// Record one notify event into the pending set.
fn record_event(pending: &Mutex<PendingChanges>, event: Event) {
    let kind = match event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => {
            ChangeKind::File
        }
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
            ChangeKind::Directory
        }
        EventKind::Create(_) | EventKind::Remove(_) => ChangeKind::Unknown,
        EventKind::Modify(ModifyKind::Data(_)) => ChangeKind::File,
        // Renames report both the old and the new path with no entry kind.
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Unknown,
        EventKind::Modify(_) => ChangeKind::Unknown,
        _ => return,
    };

    let mut pending = pending.lock();
    for path in event.paths {
        pending.entries.insert(path, kind);
    }
}

/// Registry of directory watchers keyed by canonical root path
///
/// Watchers are created lazily on first request and live for the process
/// lifetime. The registry is injected into the serving process rather than
/// hidden in a static.
#[derive(Default)]
pub struct WatcherRegistry {
    watchers: RwLock<HashMap<PathBuf, Arc<DirectoryWatcher>>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the watcher for a root, creating it on first use.
    pub fn get_or_create(&self, root: &Path) -> Result<Arc<DirectoryWatcher>, StorageError> {
        let key = dunce::canonicalize(root).map_err(|e| {
            StorageError::InvalidPath(format!("Failed to canonicalize {:?}: {}", root, e))
        })?;

        {
            let watchers = self.watchers.read();
            if let Some(watcher) = watchers.get(&key) {
                return Ok(Arc::clone(watcher));
            }
        }

        let mut watchers = self.watchers.write();
        // Re-check after acquiring the write lock; another request may have
        // created the watcher in the meantime.
        if let Some(watcher) = watchers.get(&key) {
            return Ok(Arc::clone(watcher));
        }
        let watcher = Arc::new(DirectoryWatcher::new(key.clone())?);
        watchers.insert(key, Arc::clone(&watcher));
        Ok(watcher)
    }
}

/// Result of polling for incremental changes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeSummary {
    /// When set, incremental tracking could not express the changes; the
    /// client must re-enumerate the entire mapped tree.
    pub resync: bool,

    /// Logical path to current digest, or the `DELETED` sentinel.
    pub changes: HashMap<String, String>,
}

impl ChangeSummary {
    fn resync() -> Self {
        ChangeSummary {
            resync: true,
            changes: HashMap::new(),
        }
    }
}

/// Drain a watcher and resolve its entries into a polling summary.
///
/// `project_root` must be the watcher's canonical root so that reverse path
/// mapping sees root-relative paths.
pub fn summarize_changes(
    watcher: &DirectoryWatcher,
    manifest: &Manifest,
    project_root: &Path,
) -> ChangeSummary {
    let drained = watcher.drain_and_reset();
    if drained.resync {
        debug!("Notification stream lost events; requesting resync");
        return ChangeSummary::resync();
    }

    let mut changes = HashMap::new();
    for entry in drained.entries {
        let path = &entry.path;

        if path.is_dir() {
            // A populated directory appearing or changing means a structural
            // move the event stream cannot describe file-by-file.
            let non_empty = fs::read_dir(path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false);
            if non_empty {
                debug!(path = ?path, "Non-empty directory changed; requesting resync");
                return ChangeSummary::resync();
            }
            continue;
        }

        let exists = path.is_file();
        if !exists && !has_script_extension(path) {
            // A vanished path that was not a script file was most likely a
            // directory; its removal may have taken a whole subtree with it.
            debug!(path = ?path, "Unrecognized path vanished; requesting resync");
            return ChangeSummary::resync();
        }

        let Some(script_path) = manifest.script_path_for_path(project_root, path) else {
            // Not part of a mapped tree.
            continue;
        };

        if !exists {
            changes.insert(script_path, DELETED_HASH.to_string());
            continue;
        }

        match fs::read(path) {
            Ok(bytes) => {
                changes.insert(script_path, hash_source(&String::from_utf8_lossy(&bytes)));
            }
            Err(e) => {
                // The file vanished or was locked between the notification
                // and the read; retry it on the next poll.
                debug!(path = ?path, error = %e, "Deferring unreadable changed file");
                watcher.requeue(entry);
            }
        }
    }

    ChangeSummary {
        resync: false,
        changes,
    }
}

fn has_script_extension(path: &Path) -> bool {
    path.extension()
        .map(|extension| {
            let extension = extension.to_string_lossy();
            SCRIPT_EXTENSIONS.iter().any(|known| extension.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
