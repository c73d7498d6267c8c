//! orphans command implementation.
//!
//! Lists child issues (`<parent>.<n>`) whose parent ID is missing from the
//! store. Only the root parent (text before the first `.`) is checked.

use crate::config;
use crate::error::Result;
use crate::storage::{OrphanInfo, query_orphaned_children};
use std::path::Path;

/// Execute the orphans command.
///
/// Finding orphans is not an error; the command succeeds whatever the count.
///
/// # Errors
///
/// Returns an error if the workspace or database cannot be opened.
pub fn execute(json: bool, cli: &config::CliOverrides) -> Result<()> {
    let beads_dir = config::discover_beads_dir(Some(Path::new(".")))?;
    let storage_ctx = config::open_storage_with_cli(&beads_dir, cli)?;
    let orphans = query_orphaned_children(storage_ctx.storage.connection())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&orphans)?);
        return Ok(());
    }

    print!("{}", render_text(&orphans));
    Ok(())
}

fn render_text(orphans: &[OrphanInfo]) -> String {
    if orphans.is_empty() {
        return "No orphaned child issues found\n".to_string();
    }

    let mut out = format!(
        "Orphaned child issues ({} with a missing parent):\n\n",
        orphans.len()
    );
    for (idx, orphan) in orphans.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} {}\n",
            idx + 1,
            orphan.status,
            orphan.id,
            orphan.title
        ));
    }
    out.push_str("\nDelete them with 'br delete <id>' or recreate the missing parent.\n");
    out
}
