//! Script content hashing and the hash snapshot
//!
//! Hashes are SHA-256 over carriage-return-stripped source, rendered as
//! lowercase hex, so content fetched from different platforms hashes
//! identically despite line-ending differences. Serialization always emits
//! keys in ordinal order: two independently built collections over identical
//! content serialize byte-equal, which keeps snapshots diffable and test
//! fixtures stable.

use crate::error::StorageError;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Hash method tag recorded in every collection.
pub const HASH_METHOD: &str = "SHA256";

/// Name of the persisted hash snapshot file in the project root.
pub const HASHES_FILE_NAME: &str = "causeway-hashes.json";

/// Sentinel digest reported for a mapped file that no longer exists.
pub const DELETED_HASH: &str = "DELETED";

/// Hash a script source.
///
/// Carriage returns are stripped before hashing so the digest is invariant
/// under CRLF/LF differences.
pub fn hash_source(source: &str) -> String {
    let normalized = source.replace('\r', "");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Collection of script-path to content-digest entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptHashes {
    /// Hash method used for the collection. Recorded in case it changes.
    pub hash_method: String,

    /// Current digests of the script contents, keyed by logical path.
    #[serde(serialize_with = "serialize_sorted")]
    pub hashes: HashMap<String, String>,
}

impl Default for ScriptHashes {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHashes {
    pub fn new() -> Self {
        ScriptHashes {
            hash_method: HASH_METHOD.to_string(),
            hashes: HashMap::new(),
        }
    }

    /// Recursively hash every regular file under `path`, inserting one entry
    /// per file with a logical path mirroring the relative structure under
    /// `logical_base`.
    pub fn add_file_hashes(&mut self, logical_base: &str, path: &Path) -> Result<(), StorageError> {
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk directory {:?}: {}", path, e),
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(path).map_err(|e| {
                StorageError::InvalidPath(format!(
                    "Walked entry {:?} escapes scan root {:?}: {}",
                    entry.path(),
                    path,
                    e
                ))
            })?;
            let mut script_path = logical_base.to_string();
            for segment in relative.components() {
                script_path.push('/');
                script_path.push_str(&segment.as_os_str().to_string_lossy());
            }

            // Undecodable bytes hash through replacement decoding rather than
            // failing the whole walk.
            let bytes = fs::read(entry.path())?;
            self.hashes
                .insert(script_path, hash_source(&String::from_utf8_lossy(&bytes)));
        }
        Ok(())
    }

    /// Load a snapshot from disk. An absent file yields an empty collection.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Ok(ScriptHashes::new());
        }
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to parse hash snapshot {:?}: {}", path, e),
            ))
        })
    }

    /// Persist the snapshot atomically (temp file + rename) with sorted keys.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_string_pretty(self).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to serialize hash snapshot: {}", e),
            ))
        })?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &serialized)?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(e)
        })?;

        Ok(())
    }
}

/// Serialize the hash map with keys in ordinal order.
fn serialize_sorted<S>(hashes: &HashMap<String, String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let ordered: BTreeMap<&String, &String> = hashes.iter().collect();
    ordered.serialize(serializer)
}
