//! Database schema definitions and schema bring-up.

use crate::error::Result;
use crate::storage::migrations::{MigrationReport, run_migrations};
use rusqlite::Connection;

/// Base DDL. Every statement is `IF NOT EXISTS`, so re-running is harmless.
///
/// The `issues` table is created in its original shape; later columns such
/// as `wisp_type` are added by migrations so that old and new databases go
/// through the same code path.
pub const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS issues (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open',
        ephemeral INTEGER DEFAULT 0,
        pinned INTEGER DEFAULT 0,
        CHECK (length(title) >= 1 AND length(title) <= 500)
    );
    CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);

    -- Issues changed since the last store commit
    CREATE TABLE IF NOT EXISTS dirty_issues (
        issue_id TEXT PRIMARY KEY,
        marked_at TEXT NOT NULL
    );

    -- Local commit log
    CREATE TABLE IF NOT EXISTS store_commits (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        hash TEXT NOT NULL UNIQUE,
        parent_hash TEXT,
        message TEXT NOT NULL,
        author TEXT NOT NULL,
        committed_at TEXT NOT NULL,
        issue_count INTEGER NOT NULL
    );

    -- Named remotes
    CREATE TABLE IF NOT EXISTS remotes (
        name TEXT PRIMARY KEY,
        url TEXT NOT NULL
    );

    -- Child Counters
    CREATE TABLE IF NOT EXISTS child_counters (
        parent_id TEXT PRIMARY KEY,
        next_child_number INTEGER NOT NULL DEFAULT 1
    );

    -- Config (Runtime)
    CREATE TABLE IF NOT EXISTS config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    -- Metadata
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Apply the base schema, run migrations, and set connection pragmas.
///
/// # Errors
///
/// Returns an error if the DDL fails, a migration fails, or pragmas cannot
/// be set.
pub fn apply_schema(conn: &Connection) -> Result<MigrationReport> {
    conn.execute_batch(SCHEMA_SQL)?;

    let report = run_migrations(conn)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(report)
}
