//! Idempotent schema migrations.
//!
//! There is no ledger of applied migrations. Each schema migration probes
//! the live catalog and only changes what is missing, so the full list runs
//! on every open. Advisory migrations never change the schema; they report
//! on data and always succeed unless the report itself cannot be produced.

use crate::error::{BeadsError, Result, ResultExt};
use crate::storage::introspect::{column_exists, index_exists};
use crate::storage::orphans::detect_orphaned_children;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

/// What a migration does to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    /// Changes the schema; skipped when the change is already present.
    Schema,
    /// Reads data and logs findings; never changes anything.
    Advisory,
}

/// A single registered migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub kind: MigrationKind,
    /// Reports whether the schema change is already in place.
    /// `None` for advisory migrations.
    pub probe: Option<fn(&Connection) -> Result<bool>>,
    pub apply: fn(&Connection) -> Result<()>,
}

/// All migrations in run order. Order matters: later entries may rely on
/// columns added by earlier ones.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "wisp_type_column",
        kind: MigrationKind::Schema,
        probe: Some(has_wisp_type_column),
        apply: migrate_wisp_type_column,
    },
    Migration {
        name: "wisp_type_index",
        kind: MigrationKind::Schema,
        probe: Some(has_wisp_type_index),
        apply: migrate_wisp_type_index,
    },
    Migration {
        name: "orphan_detection",
        kind: MigrationKind::Advisory,
        probe: None,
        apply: detect_orphaned_children,
    },
];

/// Result of running one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Applied,
    AlreadyApplied,
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationEntry {
    pub name: &'static str,
    pub kind: MigrationKind,
    pub outcome: MigrationOutcome,
}

/// Summary of a full migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrations: Vec<MigrationEntry>,
}

impl MigrationReport {
    /// Number of schema changes actually made by this run.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.migrations
            .iter()
            .filter(|entry| entry.outcome == MigrationOutcome::Applied)
            .count()
    }

    #[must_use]
    pub fn outcome_of(&self, name: &str) -> Option<MigrationOutcome> {
        self.migrations
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.outcome)
    }
}

/// Run every registered migration in order.
///
/// # Errors
///
/// Stops at the first failing migration and returns
/// [`BeadsError::Migration`] naming it. Migrations already applied in this
/// run stay applied.
pub fn run_migrations(conn: &Connection) -> Result<MigrationReport> {
    run_migration_list(conn, MIGRATIONS)
}

pub(crate) fn run_migration_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    for migration in migrations {
        let outcome = run_one(conn, migration)
            .map_err(|err| BeadsError::migration(migration.name, err))?;
        debug!(migration = migration.name, ?outcome, "Migration finished");
        report.migrations.push(MigrationEntry {
            name: migration.name,
            kind: migration.kind,
            outcome,
        });
    }

    if report.applied_count() > 0 {
        info!(applied = report.applied_count(), "Applied schema migrations");
    }
    Ok(report)
}

fn run_one(conn: &Connection, migration: &Migration) -> Result<MigrationOutcome> {
    match migration.kind {
        MigrationKind::Advisory => {
            (migration.apply)(conn)?;
            Ok(MigrationOutcome::Advisory)
        }
        MigrationKind::Schema => {
            if let Some(probe) = migration.probe
                && probe(conn)?
            {
                return Ok(MigrationOutcome::AlreadyApplied);
            }
            (migration.apply)(conn)?;
            Ok(MigrationOutcome::Applied)
        }
    }
}

fn has_wisp_type_column(conn: &Connection) -> Result<bool> {
    column_exists(conn, "issues", "wisp_type")
}

fn has_wisp_type_index(conn: &Connection) -> Result<bool> {
    index_exists(conn, "idx_issues_wisp_type")
}

/// Add the `wisp_type` column to `issues` if it is missing.
///
/// Existing rows get `''`, meaning "not a wisp".
///
/// # Errors
///
/// Returns an error if the column probe or the `ALTER TABLE` fails.
pub fn migrate_wisp_type_column(conn: &Connection) -> Result<()> {
    if has_wisp_type_column(conn)? {
        return Ok(());
    }

    conn.execute(
        "ALTER TABLE issues ADD COLUMN wisp_type TEXT NOT NULL DEFAULT ''",
        [],
    )
    .context("failed to add wisp_type column")?;
    Ok(())
}

/// Index `issues.wisp_type` for TTL-based compaction queries.
///
/// # Errors
///
/// Returns an error if the index probe or `CREATE INDEX` fails.
pub fn migrate_wisp_type_index(conn: &Connection) -> Result<()> {
    if has_wisp_type_index(conn)? {
        return Ok(());
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_issues_wisp_type ON issues(wisp_type)",
        [],
    )
    .context("failed to create wisp_type index")?;
    Ok(())
}
