//! Orphaned child detection.
//!
//! A child issue names its parent only through its ID. Deleting the parent
//! leaves the child behind with nothing to point at. This check is
//! advisory: it logs what it finds and never modifies data.
//!
//! Only the text before the first separator is checked. `bd-a.1.2` is an
//! orphan when `bd-a` is missing, and is not one when `bd-a` exists even if
//! `bd-a.1` does not.

use crate::error::{Result, ResultExt};
use crate::storage::introspect::table_exists;
use crate::util::first_separator_prefix;
use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

/// A child issue whose root parent is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanInfo {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// List orphaned children, ordered by ID.
///
/// # Errors
///
/// Returns an error if the `issues` table cannot be queried.
pub fn query_orphaned_children(conn: &Connection) -> Result<Vec<OrphanInfo>> {
    let mut candidates = conn
        .prepare("SELECT id, title, status FROM issues WHERE instr(id, '.') > 0 ORDER BY id")
        .context("failed to query child issues")?;
    let mut parent_lookup = conn
        .prepare("SELECT 1 FROM issues WHERE id = ?1")
        .context("failed to query child issues")?;

    let rows = candidates
        .query_map([], |row| {
            Ok(OrphanInfo {
                id: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
            })
        })
        .context("failed to query child issues")?;

    let mut orphans = Vec::new();
    for row in rows {
        let child = row.context("failed to read child issue")?;
        let Some(parent) = first_separator_prefix(&child.id) else {
            continue;
        };
        let parent_present = parent_lookup
            .exists([parent])
            .with_context(|| format!("failed to look up parent {parent}"))?;
        if !parent_present {
            orphans.push(child);
        }
    }
    Ok(orphans)
}

/// Log orphaned children as warnings.
///
/// Succeeds without doing anything when there is no `issues` table.
///
/// # Errors
///
/// Returns an error only if the table probe or the scan itself fails.
pub fn detect_orphaned_children(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "issues").context("failed to check issues table")? {
        return Ok(());
    }

    let orphans =
        query_orphaned_children(conn).context("failed to detect orphaned children")?;
    if orphans.is_empty() {
        return Ok(());
    }

    warn!(
        count = orphans.len(),
        "orphan detection: found {} orphaned child issue(s)",
        orphans.len()
    );
    for orphan in &orphans {
        warn!(id = %orphan.id, status = %orphan.status, "  - {}: {}", orphan.id, orphan.title);
    }
    warn!("fix with 'br delete <id>' or recreate the missing parent; 'br orphans' lists them");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE issues (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open'
            );",
        )
        .unwrap();
        conn
    }

    fn insert(conn: &Connection, id: &str, title: &str, status: &str) {
        conn.execute(
            "INSERT INTO issues (id, title, status) VALUES (?1, ?2, ?3)",
            [id, title, status],
        )
        .unwrap();
    }

    fn orphan_ids(conn: &Connection) -> Vec<String> {
        query_orphaned_children(conn)
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect()
    }

    #[test]
    fn no_orphans_when_parents_exist() {
        let conn = issues_table();
        insert(&conn, "bd-abc", "Parent", "open");
        insert(&conn, "bd-abc.1", "Child", "open");

        assert!(orphan_ids(&conn).is_empty());
        detect_orphaned_children(&conn).unwrap();
    }

    #[test]
    fn finds_orphans_in_id_order() {
        let conn = issues_table();
        insert(&conn, "bd-zzz.2", "Second orphan", "open");
        insert(&conn, "bd-xyz.1", "First orphan", "in_progress");
        insert(&conn, "bd-ok", "Parent", "open");
        insert(&conn, "bd-ok.1", "Fine child", "open");

        let orphans = query_orphaned_children(&conn).unwrap();
        assert_eq!(
            orphans,
            vec![
                OrphanInfo {
                    id: "bd-xyz.1".into(),
                    title: "First orphan".into(),
                    status: "in_progress".into(),
                },
                OrphanInfo {
                    id: "bd-zzz.2".into(),
                    title: "Second orphan".into(),
                    status: "open".into(),
                },
            ]
        );
        detect_orphaned_children(&conn).unwrap();
    }

    #[test]
    fn deep_nesting_checks_only_the_root() {
        let conn = issues_table();
        insert(&conn, "bd-abc", "Root", "open");
        // bd-abc.1 is missing on purpose
        insert(&conn, "bd-abc.1.1", "Grandchild", "open");

        assert!(orphan_ids(&conn).is_empty());
    }

    #[test]
    fn deep_nesting_with_missing_root_is_orphan() {
        let conn = issues_table();
        insert(&conn, "bd-gone.1.1", "Grandchild", "open");

        assert_eq!(orphan_ids(&conn), vec!["bd-gone.1.1".to_string()]);
    }

    #[test]
    fn detection_is_idempotent_and_read_only() {
        let conn = issues_table();
        insert(&conn, "bd-gone.1", "Orphan", "open");

        detect_orphaned_children(&conn).unwrap();
        detect_orphaned_children(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM issues", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(orphan_ids(&conn), vec!["bd-gone.1".to_string()]);
    }

    #[test]
    fn empty_table_has_no_orphans() {
        let conn = issues_table();
        assert!(orphan_ids(&conn).is_empty());
        detect_orphaned_children(&conn).unwrap();
    }

    #[test]
    fn top_level_issues_are_never_orphans() {
        let conn = issues_table();
        insert(&conn, "bd-a", "A", "open");
        insert(&conn, "bd-b", "B", "closed");

        assert!(orphan_ids(&conn).is_empty());
    }

    #[test]
    fn missing_issues_table_is_not_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        detect_orphaned_children(&conn).unwrap();
    }
}
