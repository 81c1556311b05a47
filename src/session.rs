//! Push sessions
//!
//! A push session is the transactional upload protocol: a client declares a
//! baseline hash collection, uploads each changed artifact (verified against
//! the negotiated digest), and completes the session into a script tree. Only
//! a completed session may be materialized to the working directory, so a
//! partial or stale upload can never reach disk.

use crate::error::{SessionError, StorageError};
use crate::hashes::{hash_source, ScriptHashes, HASHES_FILE_NAME};
use crate::manifest::Manifest;
use crate::script::ScriptInstance;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An open push session
#[derive(Debug)]
pub struct PushSession {
    id: String,
    hashes: ScriptHashes,
    scripts: HashMap<String, String>,
}

impl PushSession {
    /// Create a session around the baseline hash collection negotiated with
    /// the client.
    pub fn new(hashes: ScriptHashes) -> Self {
        PushSession {
            id: Uuid::new_v4().to_string(),
            hashes,
            scripts: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Accept one uploaded artifact.
    ///
    /// Fails with [`SessionError::NotExpected`] when the path was never
    /// declared in the baseline, and with [`SessionError::HashMismatch`] when
    /// the content does not match the negotiated digest; neither failure
    /// mutates stored state. Re-uploading a path simply replaces it.
    pub fn add(&mut self, script_path: &str, source: &str) -> Result<(), SessionError> {
        let Some(expected) = self.hashes.hashes.get(script_path) else {
            return Err(SessionError::NotExpected(script_path.to_string()));
        };

        let actual = hash_source(source);
        if &actual != expected {
            return Err(SessionError::HashMismatch {
                expected: expected.clone(),
                actual,
            });
        }

        self.scripts.insert(script_path.to_string(), source.to_string());
        Ok(())
    }

    /// Complete the session.
    ///
    /// Because `add` rejects paths outside the baseline and each path is
    /// stored at most once, comparing counts proves every baseline path was
    /// uploaded.
    pub fn complete(self) -> Result<CompletedPush, SessionError> {
        if self.scripts.len() < self.hashes.hashes.len() {
            return Err(SessionError::Incomplete);
        }

        let mut tree = ScriptInstance::root();
        for (script_path, source) in &self.scripts {
            tree.add_script(script_path, source);
        }

        Ok(CompletedPush {
            hashes: self.hashes,
            scripts: self.scripts,
            tree,
        })
    }
}

/// A completed, hash-verified push ready to be materialized
#[derive(Debug)]
pub struct CompletedPush {
    hashes: ScriptHashes,
    scripts: HashMap<String, String>,
    tree: ScriptInstance,
}

impl CompletedPush {
    pub fn into_tree(self) -> ScriptInstance {
        self.tree
    }

    /// Materialize the push into the working directory.
    ///
    /// Prunes files present in the previous snapshot but absent from the new
    /// baseline, writes every received artifact, and only then persists the
    /// sorted baseline as the new snapshot. Emptied directories are left in
    /// place; git does not track them. Callers must hold the root's write
    /// lock (see [`SessionRegistry::write_lock`]) so concurrent pushes cannot
    /// interleave their prune and write steps.
    pub fn write_files(
        &self,
        parent_directory: &Path,
        manifest: &Manifest,
    ) -> Result<(), StorageError> {
        let snapshot_path = parent_directory.join(HASHES_FILE_NAME);

        // Prune artifacts the client no longer claims.
        if snapshot_path.is_file() {
            let previous = ScriptHashes::load(&snapshot_path)?;
            for script_path in previous.hashes.keys() {
                if self.hashes.hashes.contains_key(script_path) {
                    continue;
                }
                let Some(file_path) = manifest.path_for_script_path(parent_directory, script_path)
                else {
                    continue;
                };
                if !file_path.is_file() {
                    continue;
                }
                debug!(script_path = %script_path, "Pruning removed script");
                fs::remove_file(&file_path)?;
            }
        }

        // Write the received artifacts.
        for (script_path, source) in &self.scripts {
            let Some(file_path) = manifest.path_for_script_path(parent_directory, script_path)
            else {
                warn!(script_path = %script_path, "No filesystem mapping; skipping script");
                continue;
            };
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file_path, source)?;
        }

        // The snapshot becomes authoritative only after every write landed.
        self.hashes.save(&snapshot_path)?;
        info!(
            scripts = self.scripts.len(),
            directory = ?parent_directory,
            "Materialized push session"
        );
        Ok(())
    }
}

/// Registry of open push sessions, keyed by unguessable session id
///
/// Owned by the serving process and passed into request handlers; insertion,
/// lookup, and removal are atomic with respect to each other, and each
/// session's mutation is serialized behind its own lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Mutex<PushSession>>>,
    write_locks: RwLock<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return its id.
    pub fn create(&self, hashes: ScriptHashes) -> String {
        let session = PushSession::new(hashes);
        let id = session.id().to_string();
        self.sessions.write().insert(id.clone(), Mutex::new(session));
        id
    }

    /// Upload one artifact into an open session.
    pub fn add(&self, id: &str, script_path: &str, source: &str) -> Result<(), SessionError> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let result = session.lock().add(script_path, source);
        result
    }

    /// Complete a session.
    ///
    /// The session is deregistered exactly once, whether completion succeeds
    /// or fails validation; a later call with the same id fails with
    /// [`SessionError::NotFound`].
    pub fn complete(&self, id: &str) -> Result<CompletedPush, SessionError> {
        let session = self
            .sessions
            .write()
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.into_inner().complete()
    }

    /// Number of open sessions. Sessions have no automatic expiry; hosts can
    /// observe this to layer sweeping on top.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// The materialization lock for a working-directory root.
    ///
    /// All prune+write+persist sequences against the same root must run under
    /// this lock.
    pub fn write_lock(&self, root: &Path) -> Arc<Mutex<()>> {
        {
            let locks = self.write_locks.read();
            if let Some(lock) = locks.get(root) {
                return Arc::clone(lock);
            }
        }

        let mut locks = self.write_locks.write();
        // Re-check after acquiring the write lock.
        Arc::clone(
            locks
                .entry(root.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
