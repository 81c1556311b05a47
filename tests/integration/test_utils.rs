//! Shared test utilities for integration tests

use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Create a project directory with a `.git` marker and a manifest mapping
/// `Game.Scripts` to `src/scripts` and `Game.Modules` to `src/modules`.
pub fn create_test_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    fs::create_dir_all(root.join(".git")).unwrap();
    fs::create_dir_all(root.join("src/scripts")).unwrap();
    fs::create_dir_all(root.join("src/modules")).unwrap();
    fs::write(
        root.join("causeway.json"),
        r#"{
            "name": "TestProject",
            "git": {"checkoutBranch": "main", "pushBranch": "push"},
            "paths": {
                "Game.Scripts": "src/scripts",
                "Game.Modules": "src/modules"
            }
        }"#,
    )
    .unwrap();

    temp_dir
}

/// Write a script file under the project, creating parent directories.
pub fn write_script(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
