//! End-to-end tests for workspace setup, issue creation, and remotes.

mod common;

use beads_sync::storage::SqliteStorage;
use common::assertions::{assert_issue_exists, assert_issue_missing};
use common::cli::{BrWorkspace, create_issue, extract_json_payload, init_workspace, run_br};
use serde_json::Value;

fn open_workspace_db(workspace: &BrWorkspace) -> SqliteStorage {
    SqliteStorage::open(&workspace.root.join(".beads").join("beads.db")).expect("open db")
}

#[test]
fn e2e_init_twice_fails_without_force() {
    let _log = common::test_log("e2e_init_twice_fails_without_force");
    let workspace = BrWorkspace::new();
    init_workspace(&workspace);

    let again = run_br(&workspace, ["init"], "init_again");
    assert!(!again.status.success());
    assert!(
        again.stderr.contains("ALREADY_INITIALIZED") || again.stderr.contains("Already initialized"),
        "unexpected error: {}",
        again.stderr
    );

    let forced = run_br(&workspace, ["init", "--force", "--prefix", "zz"], "init_force");
    assert!(forced.status.success(), "forced init failed: {}", forced.stderr);
}

#[test]
fn e2e_create_uses_configured_prefix() {
    let _log = common::test_log("e2e_create_uses_configured_prefix");
    let workspace = BrWorkspace::new();
    let init = run_br(&workspace, ["init", "--prefix", "proj"], "init_prefix");
    assert!(init.status.success(), "init failed: {}", init.stderr);

    let id = create_issue(&workspace, ["Prefixed issue"], "create_prefixed");
    assert!(id.starts_with("proj-"), "unexpected id {id}");

    let storage = open_workspace_db(&workspace);
    assert_issue_exists(&storage, &id);
    assert_eq!(storage.get_dirty_issue_ids().unwrap(), vec![id]);
}

#[test]
fn e2e_create_json_output() {
    let _log = common::test_log("e2e_create_json_output");
    let workspace = BrWorkspace::new();
    init_workspace(&workspace);

    let run = run_br(
        &workspace,
        ["create", "Heartbeat", "--wisp-type", "heartbeat", "--json"],
        "create_json",
    );
    assert!(run.status.success(), "create failed: {}", run.stderr);

    let json: Value =
        serde_json::from_str(&extract_json_payload(&run.stdout)).expect("valid JSON");
    assert_eq!(json["title"], "Heartbeat");
    assert_eq!(json["ephemeral"], true);
    assert_eq!(json["wisp_type"], "heartbeat");
}

#[test]
fn e2e_create_duplicate_id_fails() {
    let _log = common::test_log("e2e_create_duplicate_id_fails");
    let workspace = BrWorkspace::new();
    init_workspace(&workspace);

    create_issue(&workspace, ["First", "--id", "bd-same"], "create_first");
    let dup = run_br(&workspace, ["create", "Second", "--id", "bd-same"], "create_dup");
    assert!(!dup.status.success());
    assert_eq!(dup.status.code(), Some(3));
}

#[test]
fn e2e_create_child_of_missing_parent_fails() {
    let _log = common::test_log("e2e_create_child_of_missing_parent_fails");
    let workspace = BrWorkspace::new();
    init_workspace(&workspace);

    let run = run_br(&workspace, ["create", "Child", "--parent", "bd-nope"], "create_child");
    assert!(!run.status.success());
    assert!(
        run.stderr.contains("ISSUE_NOT_FOUND") || run.stderr.contains("bd-nope"),
        "unexpected error: {}",
        run.stderr
    );
}

#[test]
fn e2e_delete_unknown_id_deletes_nothing() {
    let _log = common::test_log("e2e_delete_unknown_id_deletes_nothing");
    let workspace = BrWorkspace::new();
    init_workspace(&workspace);
    let id = create_issue(&workspace, ["Keep me"], "create");

    let run = run_br(&workspace, ["delete", &id, "bd-missing"], "delete_mixed");
    assert!(!run.status.success());

    let storage = open_workspace_db(&workspace);
    assert_issue_exists(&storage, &id);

    let run = run_br(&workspace, ["delete", &id], "delete_one");
    assert!(run.status.success(), "delete failed: {}", run.stderr);
    let storage = open_workspace_db(&workspace);
    assert_issue_missing(&storage, &id);
}

#[test]
fn e2e_remote_lifecycle() {
    let _log = common::test_log("e2e_remote_lifecycle");
    let workspace = BrWorkspace::new();
    init_workspace(&workspace);

    let empty = run_br(&workspace, ["remote", "list"], "remote_list_empty");
    assert!(empty.status.success());
    assert!(empty.stdout.contains("No remotes configured"));

    let add = run_br(&workspace, ["remote", "add", "origin", "mirror/origin.db"], "remote_add");
    assert!(add.status.success(), "remote add failed: {}", add.stderr);

    let dup = run_br(&workspace, ["remote", "add", "origin", "other.db"], "remote_add_dup");
    assert!(!dup.status.success());
    assert!(dup.stderr.contains("REMOTE_EXISTS") || dup.stderr.contains("already exists"));

    let list = run_br(&workspace, ["remote", "list", "--json"], "remote_list_json");
    assert!(list.status.success());
    let json: Value =
        serde_json::from_str(&extract_json_payload(&list.stdout)).expect("valid JSON");
    assert_eq!(json[0]["name"], "origin");
    let url = json[0]["url"].as_str().expect("url");
    assert!(
        std::path::Path::new(url).is_absolute(),
        "relative remote paths are stored absolute: {url}"
    );
    assert!(url.ends_with("origin.db"));

    let remove = run_br(&workspace, ["remote", "remove", "origin"], "remote_remove");
    assert!(remove.status.success(), "remote remove failed: {}", remove.stderr);

    let missing = run_br(&workspace, ["remote", "remove", "origin"], "remote_remove_again");
    assert!(!missing.status.success());
    assert_eq!(missing.status.code(), Some(6));
}
