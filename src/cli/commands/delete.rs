//! Delete command implementation.
//!
//! Deletes are hard deletes. Children of a deleted issue are left alone and
//! show up in `br orphans` until their parent is recreated or they are
//! deleted too.

use crate::cli::DeleteArgs;
use crate::config;
use crate::error::{BeadsError, Result};
use crate::storage::query_orphaned_children;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Result of a delete operation for JSON output.
#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: Vec<String>,
    pub deleted_count: usize,
    /// Children whose parent is now gone.
    pub orphaned_issues: Vec<String>,
}

/// Execute the delete command.
///
/// # Errors
///
/// Returns an error if any issue is not found or the database operation fails.
/// All IDs are deleted in one transaction, so an error deletes nothing.
pub fn execute(args: &DeleteArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let ids: BTreeSet<&str> = args.ids.iter().map(String::as_str).collect();
    if ids.is_empty() {
        return Err(BeadsError::validation("ids", "no issue IDs provided"));
    }

    let beads_dir = config::discover_beads_dir(Some(Path::new(".")))?;
    let mut storage_ctx = config::open_storage_with_cli(&beads_dir, cli)?;
    let layer = config::load_config(&beads_dir, Some(&storage_ctx.storage), cli)?;
    let actor = config::resolve_actor(&layer);
    let storage = &mut storage_ctx.storage;

    let targets: Vec<&str> = ids.iter().copied().collect();
    let deleted: Vec<String> = storage
        .delete_issues(&targets, &actor)?
        .into_iter()
        .map(|issue| issue.id)
        .collect();

    let orphaned_issues: Vec<String> = query_orphaned_children(storage.connection())?
        .into_iter()
        .map(|orphan| orphan.id)
        .filter(|orphan_id| {
            crate::util::id::first_separator_prefix(orphan_id)
                .is_some_and(|parent| ids.contains(parent))
        })
        .collect();

    let result = DeleteResult {
        deleted_count: deleted.len(),
        deleted,
        orphaned_issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for id in &result.deleted {
        println!("Deleted {id}");
    }
    if !result.orphaned_issues.is_empty() {
        println!(
            "{} child issue(s) left without a parent: {}",
            result.orphaned_issues.len(),
            result.orphaned_issues.join(", ")
        );
    }
    Ok(())
}
