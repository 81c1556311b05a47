//! Change polling tests against a live filesystem watcher
//!
//! Notification delivery is asynchronous, so these tests poll with a deadline
//! instead of asserting on a single drain.

use super::test_utils::{create_test_project, write_script};
use causeway::api::SyncApi;
use causeway::hashes::{hash_source, DELETED_HASH};
use causeway::watch::ChangeSummary;
use std::fs;
use std::time::{Duration, Instant};

/// Poll `list_changes` until `predicate` accepts a summary or the deadline
/// passes. Non-matching summaries are merged into the last seen state so a
/// change split across drains is still observed.
fn poll_until<F>(api: &SyncApi, predicate: F) -> Option<ChangeSummary>
where
    F: Fn(&ChangeSummary) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut merged = ChangeSummary::default();
    while Instant::now() < deadline {
        let summary = api.list_changes().unwrap();
        merged.resync |= summary.resync;
        merged.changes.extend(summary.changes);
        if predicate(&merged) {
            return Some(merged);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    None
}

#[test]
fn modified_script_is_reported_with_its_digest() {
    let project = create_test_project();
    let api = SyncApi::open(project.path()).unwrap();

    // First poll registers the watcher for the project root.
    api.list_changes().unwrap();

    write_script(project.path(), "src/scripts/Main.lua", "Source1");

    let summary = poll_until(&api, |s| s.changes.contains_key("Game/Scripts/Main.lua"))
        .expect("change was never reported");
    assert_eq!(
        summary.changes.get("Game/Scripts/Main.lua"),
        Some(&hash_source("Source1"))
    );
}

#[test]
fn deleted_script_is_reported_with_the_sentinel() {
    let project = create_test_project();
    write_script(project.path(), "src/scripts/Gone.lua", "Source1");
    let api = SyncApi::open(project.path()).unwrap();

    api.list_changes().unwrap();
    fs::remove_file(project.path().join("src/scripts/Gone.lua")).unwrap();

    let summary = poll_until(&api, |s| {
        s.changes.get("Game/Scripts/Gone.lua").map(String::as_str) == Some(DELETED_HASH)
    })
    .expect("deletion was never reported");
    assert!(!summary.resync);
}

#[test]
fn unmapped_changes_are_not_reported() {
    let project = create_test_project();
    let api = SyncApi::open(project.path()).unwrap();

    api.list_changes().unwrap();
    // Written to the project root, which no mapping covers. A fresh
    // directory is avoided here: a new non-empty directory would trigger
    // the structural-change resync fallback instead.
    write_script(project.path(), "Stray.lua", "ignored");
    write_script(project.path(), "src/scripts/Real.lua", "Source1");

    // Once the mapped change shows up, the unmapped one must not be present.
    let summary = poll_until(&api, |s| s.changes.contains_key("Game/Scripts/Real.lua"))
        .expect("mapped change was never reported");
    assert!(summary
        .changes
        .keys()
        .all(|path| path.starts_with("Game/")));
}
