#![allow(dead_code)]

use beads_sync::model::Issue;
use beads_sync::storage::SqliteStorage;
use std::path::Path;
use tracing::info;

pub fn assert_issue_exists(storage: &SqliteStorage, id: &str) {
    info!("Asserting issue exists: {}", id);
    let issue = storage
        .get_issue(id)
        .unwrap_or_else(|err| panic!("get_issue failed for {id}: {err}"));
    assert!(issue.is_some(), "expected issue {id} to exist");
}

pub fn assert_issue_missing(storage: &SqliteStorage, id: &str) {
    info!("Asserting issue is gone: {}", id);
    let issue = storage
        .get_issue(id)
        .unwrap_or_else(|err| panic!("get_issue failed for {id}: {err}"));
    assert!(issue.is_none(), "expected issue {id} to be absent");
}

/// IDs listed in a JSONL export, in file order.
pub fn jsonl_ids(path: &Path) -> Vec<String> {
    info!("Reading JSONL ids from {}", path.display());
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()));
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let issue: Issue = serde_json::from_str(line)
                .unwrap_or_else(|err| panic!("bad JSONL line in {}: {err}", path.display()));
            issue.id
        })
        .collect()
}
