//! Engine facade
//!
//! `SyncApi` owns the manifest, the project root, and the shared registries,
//! and exposes the operations a transport layer serves: hash enumeration,
//! script reads, the push-session protocol, and change polling. Every
//! protocol failure is an error value recovered at the request boundary.

use crate::error::{StorageError, SyncError};
use crate::hashes::{ScriptHashes, HASHES_FILE_NAME};
use crate::manifest::{self, Manifest, GIT_DIRECTORY_NAME, MANIFEST_FILE_NAME};
use crate::script::ScriptInstance;
use crate::session::SessionRegistry;
use crate::watch::{summarize_changes, ChangeSummary, WatcherRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The synchronization engine for one project
pub struct SyncApi {
    project_root: PathBuf,
    manifest: Manifest,
    sessions: SessionRegistry,
    watchers: WatcherRegistry,
}

impl SyncApi {
    /// Create an engine over an already-located project root and manifest.
    pub fn new(project_root: PathBuf, manifest: Manifest) -> Self {
        SyncApi {
            project_root,
            manifest,
            sessions: SessionRegistry::new(),
            watchers: WatcherRegistry::new(),
        }
    }

    /// Discover the project from `start`: the project root is the nearest
    /// ancestor containing `.git`, and the manifest is `causeway.json` found
    /// in `start` or any ancestor.
    pub fn open(start: &Path) -> Result<Self, SyncError> {
        let manifest_path = manifest::find_file_in_parent(start, MANIFEST_FILE_NAME)
            .ok_or_else(|| {
                SyncError::ConfigError(format!(
                    "No {} found in {:?} or its parents",
                    MANIFEST_FILE_NAME, start
                ))
            })?;
        let project_root = manifest::parent_directory_of(start, GIT_DIRECTORY_NAME)
            .ok_or_else(|| {
                SyncError::ConfigError(format!(
                    "No {} directory found above {:?}",
                    GIT_DIRECTORY_NAME, start
                ))
            })?;
        let manifest = Manifest::load(&manifest_path)?;
        info!(project_root = ?project_root, manifest = ?manifest_path, "Opened project");
        Ok(Self::new(project_root, manifest))
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Walk every mapped directory into a fresh hash collection.
    ///
    /// Mapped directories that do not exist yet are skipped; they simply
    /// contribute no entries.
    pub fn list_hashes(&self) -> Result<ScriptHashes, SyncError> {
        let mut hashes = ScriptHashes::new();
        for (prefix, directory) in &self.manifest.paths {
            let logical_base = prefix.replace('.', "/");
            let directory_path = self.project_root.join(directory);
            if !directory_path.is_dir() {
                warn!(directory = ?directory_path, "Mapped directory missing; skipping");
                continue;
            }
            hashes.add_file_hashes(&logical_base, &directory_path)?;
        }
        Ok(hashes)
    }

    /// Read the contents of the file backing a logical script path.
    pub fn read_script(&self, script_path: &str) -> Result<String, SyncError> {
        let file_path = self
            .manifest
            .path_for_script_path(&self.project_root, script_path)
            .ok_or_else(|| SyncError::MappingNotFound(script_path.to_string()))?;
        if !file_path.is_file() {
            return Err(SyncError::FileNotFound(script_path.to_string()));
        }
        fs::read_to_string(&file_path).map_err(|e| SyncError::Storage(StorageError::IoError(e)))
    }

    /// The last persisted hash snapshot; empty when none has been written.
    pub fn project_hashes(&self) -> Result<ScriptHashes, SyncError> {
        let snapshot_path = self.project_root.join(HASHES_FILE_NAME);
        Ok(ScriptHashes::load(&snapshot_path)?)
    }

    /// Start a push session around a client-declared baseline.
    pub fn start_session(&self, hashes: ScriptHashes) -> String {
        let id = self.sessions.create(hashes);
        info!(session = %id, "Push session started");
        id
    }

    /// Upload one artifact into an open session.
    pub fn add_to_session(
        &self,
        id: &str,
        script_path: &str,
        contents: &str,
    ) -> Result<(), SyncError> {
        self.sessions.add(id, script_path, contents)?;
        Ok(())
    }

    /// Complete a session and materialize it into the working directory.
    ///
    /// The external version-control steps (fetch, checkout, commit, push) are
    /// layered on top by the caller and must only run after this returns
    /// successfully.
    pub fn complete_session(&self, id: &str) -> Result<ScriptInstance, SyncError> {
        let completed = self.sessions.complete(id)?;

        let lock = self.sessions.write_lock(&self.project_root);
        let _guard = lock.lock();
        completed.write_files(&self.project_root, &self.manifest)?;

        info!(session = %id, "Push session completed");
        Ok(completed.into_tree())
    }

    /// Poll for changes since the last poll.
    pub fn list_changes(&self) -> Result<ChangeSummary, SyncError> {
        let watcher = self.watchers.get_or_create(&self.project_root)?;
        Ok(summarize_changes(&watcher, &self.manifest, watcher.root()))
    }

    /// Number of open push sessions.
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}
