//! Live catalog introspection.
//!
//! Absent tables, columns, and indexes are answered with `false`. Only a
//! failing catalog query is an error, and it is wrapped with the probe that
//! was being made.

use crate::error::{Result, ResultExt};
use rusqlite::Connection;

/// Does a table named `name` exist in the main schema?
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    schema_object_exists(conn, "table", name)
        .with_context(|| format!("failed to check table {name}"))
}

/// Does an index named `name` exist in the main schema?
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn index_exists(conn: &Connection, name: &str) -> Result<bool> {
    schema_object_exists(conn, "index", name)
        .with_context(|| format!("failed to check index {name}"))
}

/// Does `table` have a column named `column`?
///
/// A missing table yields `false`, since `pragma_table_info` returns no
/// rows for it.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.prepare_cached("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")
        .and_then(|mut stmt| stmt.exists([table, column]))
        .with_context(|| format!("failed to check column {table}.{column}"))
}

fn schema_object_exists(conn: &Connection, kind: &str, name: &str) -> rusqlite::Result<bool> {
    conn.prepare_cached("SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2")
        .and_then(|mut stmt| stmt.exists([kind, name]))
}
