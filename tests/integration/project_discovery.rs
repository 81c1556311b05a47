//! Project discovery and file-surface tests

use super::test_utils::{create_test_project, write_script};
use causeway::api::SyncApi;
use causeway::error::SyncError;
use causeway::hashes::hash_source;
use std::fs;
use tempfile::TempDir;

#[test]
fn open_discovers_root_and_manifest_from_nested_directory() {
    let project = create_test_project();
    let nested = project.path().join("src/scripts");

    let api = SyncApi::open(&nested).unwrap();
    assert_eq!(api.project_root(), project.path());
    assert_eq!(api.manifest().name.as_deref(), Some("TestProject"));
    assert_eq!(api.manifest().git.checkout_branch.as_deref(), Some("main"));
}

#[test]
fn open_fails_without_manifest() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".git")).unwrap();

    assert!(matches!(
        SyncApi::open(temp_dir.path()),
        Err(SyncError::ConfigError(_))
    ));
}

#[test]
fn open_rejects_ambiguous_manifest() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
    fs::write(
        temp_dir.path().join("causeway.json"),
        // "A.B" and "A/B" normalize to the same logical prefix.
        r#"{"paths": {"A.B": "src/one", "A/B": "src/two"}}"#,
    )
    .unwrap();

    assert!(matches!(
        SyncApi::open(temp_dir.path()),
        Err(SyncError::Manifest(_))
    ));
}

#[test]
fn list_hashes_walks_all_mapped_directories() {
    let project = create_test_project();
    let root = project.path();
    write_script(root, "src/scripts/Main.lua", "Source1");
    write_script(root, "src/scripts/Util/Math.lua", "Source2");
    write_script(root, "src/modules/Loader.lua", "Source3");

    let api = SyncApi::open(root).unwrap();
    let hashes = api.list_hashes().unwrap();

    assert_eq!(hashes.hashes.len(), 3);
    assert_eq!(
        hashes.hashes.get("Game/Scripts/Main.lua"),
        Some(&hash_source("Source1"))
    );
    assert_eq!(
        hashes.hashes.get("Game/Scripts/Util/Math.lua"),
        Some(&hash_source("Source2"))
    );
    assert_eq!(
        hashes.hashes.get("Game/Modules/Loader.lua"),
        Some(&hash_source("Source3"))
    );
}

#[test]
fn read_script_resolves_through_the_manifest() {
    let project = create_test_project();
    write_script(project.path(), "src/scripts/Main.lua", "print('hi')");

    let api = SyncApi::open(project.path()).unwrap();
    assert_eq!(
        api.read_script("Game/Scripts/Main.lua").unwrap(),
        "print('hi')"
    );

    assert!(matches!(
        api.read_script("Unmapped/Path"),
        Err(SyncError::MappingNotFound(_))
    ));
    assert!(matches!(
        api.read_script("Game/Scripts/Missing.lua"),
        Err(SyncError::FileNotFound(_))
    ));
}

#[test]
fn project_hashes_is_empty_before_first_push() {
    let project = create_test_project();
    let api = SyncApi::open(project.path()).unwrap();

    let snapshot = api.project_hashes().unwrap();
    assert!(snapshot.hashes.is_empty());
}
