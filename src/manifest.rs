//! Project manifest: the path-mapping table and remote metadata
//!
//! The manifest maps dot-hierarchical logical prefixes (the namespace of the
//! external editor) to filesystem-relative directories. Resolution in both
//! directions uses longest path-segment-prefix matching; overlapping mappings
//! of equal length are rejected at validation time so resolution never depends
//! on iteration order.

use crate::error::ManifestError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project manifest file.
pub const MANIFEST_FILE_NAME: &str = "causeway.json";

/// Name of the directory used by git projects.
pub const GIT_DIRECTORY_NAME: &str = ".git";

/// Git metadata for the project. Consumed by the external version-control
/// collaborator after a push completes; the engine itself never invokes git.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitConfiguration {
    /// Branch to check out before materializing a push.
    pub checkout_branch: Option<String>,
    /// Branch to push completed commits to.
    pub push_branch: Option<String>,
    /// Default commit message when the client does not provide one.
    pub commit_message: Option<String>,
}

/// Project manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    /// Optional display name of the project.
    pub name: Option<String>,

    /// Optional place id to require for pulling/pushing changes.
    pub push_place_id: Option<i64>,

    /// Optional place id to require for live syncing changes.
    pub sync_place_id: Option<i64>,

    /// Git metadata for the external version-control collaborator.
    pub git: GitConfiguration,

    /// Logical prefixes (dot-hierarchical) to filesystem-relative directories.
    pub paths: BTreeMap<String, String>,
}

impl Manifest {
    /// Load and validate a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest: Manifest =
            serde_json::from_str(&contents).map_err(|e| ManifestError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the path-mapping table.
    ///
    /// Two distinct logical prefixes can only be ambiguous for some script
    /// path when their slash-normalized forms are identical, so rejecting
    /// duplicate normalized prefixes (and duplicate target directories, which
    /// would make the reverse mapping ambiguous) is sufficient.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen_prefixes = HashSet::new();
        let mut seen_directories = HashSet::new();
        for (prefix, directory) in &self.paths {
            if !seen_prefixes.insert(normalize_prefix(prefix)) {
                return Err(ManifestError::DuplicatePrefix(prefix.clone()));
            }
            if !seen_directories.insert(normalize_directory(directory)) {
                return Err(ManifestError::DuplicateDirectory(directory.clone()));
            }
        }
        Ok(())
    }

    /// Resolve a logical script path to a filesystem path under the project
    /// root, or `None` if no mapping covers it.
    ///
    /// The registered prefix that is the longest path-segment prefix of the
    /// script path wins: `Path1` matches `Path1/Path2` but not `Path12`.
    pub fn path_for_script_path(&self, project_root: &Path, script_path: &str) -> Option<PathBuf> {
        let mut best: Option<(usize, PathBuf)> = None;
        for (prefix, directory) in &self.paths {
            let normalized = normalize_prefix(prefix);
            if !is_segment_prefix(&normalized, script_path) {
                continue;
            }
            if best.as_ref().is_some_and(|(len, _)| *len >= normalized.len()) {
                continue;
            }
            let remainder = strip_segments(script_path, &normalized);
            let mut resolved = join_slash_path(project_root, directory);
            resolved = join_slash_path(&resolved, remainder);
            best = Some((normalized.len(), resolved));
        }
        best.map(|(_, path)| path)
    }

    /// Resolve a filesystem path back to its logical script path, or `None`
    /// if it is not under a mapped directory.
    pub fn script_path_for_path(&self, project_root: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(project_root).ok()?;
        let relative = slash_path(relative);

        let mut best: Option<(usize, String)> = None;
        for (prefix, directory) in &self.paths {
            let directory = normalize_directory(directory);
            if !is_segment_prefix(&directory, &relative) {
                continue;
            }
            if best.as_ref().is_some_and(|(len, _)| *len >= directory.len()) {
                continue;
            }
            let remainder = strip_segments(&relative, &directory);
            let script_path = if remainder.is_empty() {
                normalize_prefix(prefix)
            } else {
                format!("{}/{}", normalize_prefix(prefix), remainder)
            };
            best = Some((directory.len(), script_path));
        }
        best.map(|(_, script_path)| script_path)
    }
}

/// Normalize a logical prefix to its slash form (`A.B` becomes `A/B`).
fn normalize_prefix(prefix: &str) -> String {
    prefix.replace('.', "/")
}

/// Normalize a mapped directory to forward slashes without trailing slash.
fn normalize_directory(directory: &str) -> String {
    directory.replace('\\', "/").trim_matches('/').to_string()
}

/// Whether `prefix` covers `path` on a path-segment boundary.
fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(remainder) => remainder.is_empty() || remainder.starts_with('/'),
        None => false,
    }
}

/// Strip a matched segment prefix and its separator from `path`.
fn strip_segments<'a>(path: &'a str, prefix: &str) -> &'a str {
    path[prefix.len()..].trim_start_matches('/')
}

/// Join a slash-delimited relative path onto a base, one segment at a time.
fn join_slash_path(base: &Path, relative: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        joined.push(segment);
    }
    joined
}

/// Render a relative filesystem path as a slash-delimited string.
fn slash_path(path: &Path) -> String {
    let segments: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    segments.join("/")
}

/// Find a file or directory by name in `start` or any of its ancestors.
///
/// Returns the directory containing the entry, or `None` if no ancestor
/// contains it.
pub fn parent_directory_of(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(directory) = current {
        if directory.join(file_name).exists() {
            return Some(directory.to_path_buf());
        }
        current = directory.parent();
    }
    None
}

/// Find a file by name in `start` or any of its ancestors and return its
/// full path.
pub fn find_file_in_parent(start: &Path, file_name: &str) -> Option<PathBuf> {
    parent_directory_of(start, file_name).map(|directory| directory.join(file_name))
}
