//! Causeway: Script-Tree Synchronization Engine
//!
//! Synchronizes a hierarchical tree of named, textual script artifacts from an
//! external editor into a git-tracked working directory. Provides content-hash
//! change detection, bidirectional logical/filesystem path mapping, and a
//! transactional push-session protocol that only commits complete,
//! hash-verified snapshots.

pub mod api;
pub mod error;
pub mod hashes;
pub mod logging;
pub mod manifest;
pub mod script;
pub mod session;
pub mod watch;
