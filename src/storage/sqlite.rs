//! `SQLite` storage implementation.
//!
//! Besides issue CRUD, the store keeps a small versioning layer: mutations
//! mark issues dirty, `commit` snapshots the working set into a commit log,
//! and `push` publishes a copy of the database to a named remote.

use crate::error::{BeadsError, OptionExt, Result, ResultExt};
use crate::model::{Issue, Status, WispType};
use crate::storage::migrations::{MigrationReport, run_migrations};
use crate::storage::schema::apply_schema;
use crate::util::{child_id, validate_id};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const ISSUE_COLUMNS: &str = "id, title, status, ephemeral, pinned, wisp_type";
const COMMIT_COLUMNS: &str = "hash, parent_hash, message, author, committed_at, issue_count";
const MAX_TITLE_CHARS: usize = 500;

/// Metadata key holding the hash of the latest commit.
pub const HEAD_COMMIT_KEY: &str = "head_commit";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
    migration_report: MigrationReport,
}

/// Context for a mutation operation, tracking side effects.
pub struct MutationContext {
    pub op_name: String,
    pub actor: String,
    pub dirty_ids: HashSet<String>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            dirty_ids: HashSet::new(),
        }
    }

    pub fn mark_dirty(&mut self, issue_id: &str) {
        self.dirty_ids.insert(issue_id.to_string());
    }
}

/// One entry of the local commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub parent: Option<String>,
    pub message: String,
    pub author: String,
    pub committed_at: DateTime<Utc>,
    pub issue_count: usize,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushInfo {
    pub remote: String,
    pub url: String,
    /// Commit that was current when the snapshot was taken.
    pub head: Option<String>,
}

impl SqliteStorage {
    /// Open a new connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a new connection with an optional busy timeout (ms).
    ///
    /// Migrations run as part of opening. A database that stays busy past
    /// the timeout is reported as [`BeadsError::DatabaseLocked`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open_with_timeout(path: &Path, lock_timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        }
        let migration_report = apply_schema(&conn).map_err(|err| {
            if err.is_store_unavailable() {
                BeadsError::DatabaseLocked {
                    path: path.to_path_buf(),
                }
            } else {
                err
            }
        })?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            migration_report,
        })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let migration_report = apply_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            migration_report,
        })
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Migrations performed while opening this handle.
    #[must_use]
    pub const fn migration_report(&self) -> &MigrationReport {
        &self.migration_report
    }

    /// Run the migration list again on the open connection.
    ///
    /// # Errors
    ///
    /// Returns the first migration failure.
    pub fn run_migrations(&mut self) -> Result<MigrationReport> {
        let report = run_migrations(&self.conn)?;
        self.migration_report = report.clone();
        Ok(report)
    }

    /// Execute a mutation inside an immediate transaction.
    ///
    /// Issues marked dirty through the context are recorded before commit.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails (e.g. database error, logic error).
    /// The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        let marked_at = Utc::now().to_rfc3339();
        for id in &ctx.dirty_ids {
            tx.execute(
                "INSERT OR REPLACE INTO dirty_issues (issue_id, marked_at) VALUES (?, ?)",
                rusqlite::params![id, marked_at],
            )?;
        }

        tx.commit()?;
        debug!(op = %ctx.op_name, actor = %ctx.actor, dirty = ctx.dirty_ids.len(), "Mutation committed");

        Ok(result)
    }

    // ========================================================================
    // Issues
    // ========================================================================

    /// Create a new issue.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` or `Validation` for bad input, and `IdCollision`
    /// if the ID is already taken.
    pub fn create_issue(&mut self, issue: &Issue, actor: &str) -> Result<()> {
        validate_id(&issue.id)?;
        if issue.title.trim().is_empty() {
            return Err(BeadsError::validation("title", "cannot be empty"));
        }
        if issue.title.chars().count() > MAX_TITLE_CHARS {
            return Err(BeadsError::validation(
                "title",
                format!("exceeds {MAX_TITLE_CHARS} characters"),
            ));
        }

        self.mutate("create_issue", actor, |tx, ctx| {
            if issue_exists_in(tx, &issue.id)? {
                return Err(BeadsError::IdCollision {
                    id: issue.id.clone(),
                });
            }

            tx.execute(
                "INSERT INTO issues (id, title, status, ephemeral, pinned, wisp_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    issue.id,
                    issue.title,
                    issue.status.as_str(),
                    issue.ephemeral,
                    issue.pinned,
                    issue.wisp_type.as_ref().map_or("", WispType::as_str),
                ],
            )?;
            ctx.mark_dirty(&issue.id);
            Ok(())
        })
    }

    /// Hard-delete an issue. Children are left in place.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if the issue does not exist.
    pub fn delete_issue(&mut self, id: &str, actor: &str) -> Result<Issue> {
        let mut deleted = self.delete_issues(&[id], actor)?;
        deleted.pop().ok_or_not_found(id)
    }

    /// Hard-delete several issues in one transaction.
    ///
    /// Every ID is looked up before any row is removed; if one is missing,
    /// nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` for the first missing ID, or a database error.
    pub fn delete_issues(&mut self, ids: &[&str], actor: &str) -> Result<Vec<Issue>> {
        self.mutate("delete_issues", actor, |tx, ctx| {
            let mut deleted = Vec::with_capacity(ids.len());
            for &id in ids {
                let issue = tx
                    .query_row(
                        &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?"),
                        [id],
                        issue_from_row,
                    )
                    .optional()?
                    .ok_or_not_found(id)?;
                deleted.push(issue);
            }
            for issue in &deleted {
                tx.execute("DELETE FROM issues WHERE id = ?", [&issue.id])?;
                ctx.mark_dirty(&issue.id);
            }
            Ok(deleted)
        })
    }

    /// Get an issue by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        let issue = self
            .conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?"),
                [id],
                issue_from_row,
            )
            .optional()?;
        Ok(issue)
    }

    /// Get all issues for JSONL export.
    ///
    /// Excludes ephemerals. Returns issues sorted by ID for deterministic output.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_all_issues_for_export(&self) -> Result<Vec<Issue>> {
        load_issues(
            &self.conn,
            &format!(
                "SELECT {ISSUE_COLUMNS} FROM issues
                 WHERE (ephemeral = 0 OR ephemeral IS NULL)
                 ORDER BY id ASC"
            ),
        )
    }

    /// Check whether an issue ID exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn id_exists(&self, id: &str) -> Result<bool> {
        issue_exists_in(&self.conn, id)
    }

    /// Count total issues in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_issues(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM issues", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Reserve the next child ID under `parent_id`.
    ///
    /// Numbers come from `child_counters` and skip any IDs already present,
    /// so a deleted child's number is not handed out again.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if the parent does not exist.
    pub fn next_child_id(&mut self, parent_id: &str) -> Result<String> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        if !issue_exists_in(&tx, parent_id)? {
            return Err(BeadsError::IssueNotFound {
                id: parent_id.to_string(),
            });
        }

        let stored: Option<i64> = tx
            .query_row(
                "SELECT next_child_number FROM child_counters WHERE parent_id = ?",
                [parent_id],
                |row| row.get(0),
            )
            .optional()?;
        let mut number = stored
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);

        let mut candidate = child_id(parent_id, number);
        while issue_exists_in(&tx, &candidate)? {
            number += 1;
            candidate = child_id(parent_id, number);
        }

        tx.execute(
            "INSERT INTO child_counters (parent_id, next_child_number) VALUES (?1, ?2)
             ON CONFLICT(parent_id) DO UPDATE SET next_child_number = excluded.next_child_number",
            rusqlite::params![parent_id, i64::from(number) + 1],
        )?;
        tx.commit()?;

        Ok(candidate)
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// Get IDs of all dirty issues (issues changed since the last commit).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_dirty_issue_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT issue_id FROM dirty_issues ORDER BY marked_at, issue_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ========================================================================
    // Commits
    // ========================================================================

    /// Record the current issue set as a new commit.
    ///
    /// The commit hash covers the parent hash, author, timestamp, message,
    /// and the canonical JSON of every issue. Dirty flags are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::NothingToCommit`] when no issue changed since
    /// the last commit.
    pub fn commit(&mut self, message: &str, author: &str) -> Result<CommitInfo> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let dirty: i64 = tx.query_row("SELECT count(*) FROM dirty_issues", [], |row| row.get(0))?;
        if dirty == 0 {
            return Err(BeadsError::NothingToCommit);
        }

        let parent = latest_commit_in(&tx)?.map(|c| c.hash);
        let issues = load_issues(
            &tx,
            &format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY id ASC"),
        )?;
        let committed_at = Utc::now();
        let hash = commit_hash(parent.as_deref(), author, committed_at, message, &issues)?;

        tx.execute(
            &format!("INSERT INTO store_commits ({COMMIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            rusqlite::params![
                hash,
                parent,
                message,
                author,
                committed_at.to_rfc3339(),
                i64::try_from(issues.len()).unwrap_or(i64::MAX),
            ],
        )?;
        tx.execute("DELETE FROM dirty_issues", [])?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            [HEAD_COMMIT_KEY, hash.as_str()],
        )?;
        tx.commit()?;

        info!(hash = %hash, author, issues = issues.len(), "Committed working set");
        Ok(CommitInfo {
            hash,
            parent,
            message: message.to_string(),
            author: author.to_string(),
            committed_at,
            issue_count: issues.len(),
        })
    }

    /// The most recent commit, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn head_commit(&self) -> Result<Option<CommitInfo>> {
        latest_commit_in(&self.conn)
    }

    /// Commits, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_commits(&self, limit: usize) -> Result<Vec<CommitInfo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS} FROM store_commits ORDER BY seq DESC LIMIT ?"
        ))?;
        let commits = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], commit_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(commits)
    }

    // ========================================================================
    // Remotes
    // ========================================================================

    /// Register a named remote.
    ///
    /// # Errors
    ///
    /// Returns `RemoteExists` if the name is taken, or `Validation` for an
    /// empty name or URL.
    pub fn add_remote(&mut self, name: &str, url: &str) -> Result<()> {
        if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
            return Err(BeadsError::validation(
                "remote",
                "name must be non-empty and contain no whitespace",
            ));
        }
        if url.trim().is_empty() {
            return Err(BeadsError::validation("remote", "url cannot be empty"));
        }
        if self.has_remote(name)? {
            return Err(BeadsError::RemoteExists {
                name: name.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO remotes (name, url) VALUES (?, ?)",
            [name, url],
        )?;
        Ok(())
    }

    /// Remove a named remote.
    ///
    /// # Errors
    ///
    /// Returns `RemoteNotFound` if no such remote exists.
    pub fn remove_remote(&mut self, name: &str) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM remotes WHERE name = ?", [name])?;
        if removed == 0 {
            return Err(BeadsError::RemoteNotFound {
                name: name.to_string(),
            });
        }
        self.delete_metadata(&pushed_head_key(name))?;
        Ok(())
    }

    /// All remotes, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_remotes(&self) -> Result<Vec<RemoteInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, url FROM remotes ORDER BY name")?;
        let remotes = stmt
            .query_map([], |row| {
                Ok(RemoteInfo {
                    name: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(remotes)
    }

    /// URL of a named remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_remote(&self, name: &str) -> Result<Option<String>> {
        let url = self
            .conn
            .query_row("SELECT url FROM remotes WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(url)
    }

    /// Is a remote with this name configured?
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn has_remote(&self, name: &str) -> Result<bool> {
        Ok(self.get_remote(name)?.is_some())
    }

    /// Publish a snapshot of this database to a remote.
    ///
    /// Remote URLs are filesystem paths, optionally prefixed with `file://`.
    /// The snapshot is written beside the target and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns `RemoteNotFound` for an unknown remote, `Config` for an
    /// unsupported URL, or the I/O or database error from writing the
    /// snapshot.
    pub fn push(&mut self, name: &str) -> Result<PushInfo> {
        let url = self
            .get_remote(name)?
            .ok_or_else(|| BeadsError::RemoteNotFound {
                name: name.to_string(),
            })?;
        let target = remote_target_path(&url)?;
        if self.path.as_deref() == Some(target.as_path()) {
            return Err(BeadsError::Config(format!(
                "remote '{name}' points at the local database"
            )));
        }

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut temp_name = target.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = target.with_file_name(temp_name);
        if temp_path.exists() {
            fs::remove_file(&temp_path)?;
        }

        let temp_str = temp_path.to_string_lossy().into_owned();
        self.conn.execute("VACUUM INTO ?", [&temp_str])?;
        fs::rename(&temp_path, &target).with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                target.display()
            )
        })?;

        let head = self.head_commit()?.map(|c| c.hash);
        self.set_metadata(&pushed_head_key(name), head.as_deref().unwrap_or(""))?;

        info!(remote = name, path = %target.display(), "Pushed snapshot");
        Ok(PushInfo {
            remote: name.to_string(),
            url,
            head,
        })
    }

    // ========================================================================
    // Config and metadata
    // ========================================================================

    /// Fetch a config value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Fetch all config values from the config table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_all_config(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM config")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Set a config value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Get a metadata value by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    /// Delete a metadata key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn delete_metadata(&mut self, key: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM metadata WHERE key = ?", [key])?;
        Ok(count > 0)
    }
}

/// Metadata key recording the head pushed to a remote.
#[must_use]
pub fn pushed_head_key(remote: &str) -> String {
    format!("remote.{remote}.pushed_head")
}

fn remote_target_path(url: &str) -> Result<PathBuf> {
    let raw = url.strip_prefix("file://").unwrap_or(url);
    if raw.contains("://") {
        return Err(BeadsError::Config(format!(
            "unsupported remote URL '{url}': only filesystem paths can be pushed to"
        )));
    }
    if raw.is_empty() {
        return Err(BeadsError::Config("remote URL is empty".to_string()));
    }
    Ok(PathBuf::from(raw))
}

fn issue_exists_in(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn
        .prepare_cached("SELECT 1 FROM issues WHERE id = ?")?
        .exists([id])?;
    Ok(exists)
}

fn load_issues(conn: &Connection, sql: &str) -> Result<Vec<Issue>> {
    let mut stmt = conn.prepare(sql)?;
    let issues = stmt
        .query_map([], issue_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(issues)
}

fn latest_commit_in(conn: &Connection) -> Result<Option<CommitInfo>> {
    let commit = conn
        .query_row(
            &format!("SELECT {COMMIT_COLUMNS} FROM store_commits ORDER BY seq DESC LIMIT 1"),
            [],
            commit_from_row,
        )
        .optional()?;
    Ok(commit)
}

fn issue_from_row(row: &rusqlite::Row) -> rusqlite::Result<Issue> {
    let status: Option<String> = row.get(2)?;
    let wisp_type: Option<String> = row.get(5)?;
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        status: status.as_deref().map_or(Status::Open, Status::from_db),
        ephemeral: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
        pinned: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
        wisp_type: wisp_type.as_deref().and_then(WispType::from_db),
    })
}

fn commit_from_row(row: &rusqlite::Row) -> rusqlite::Result<CommitInfo> {
    let committed_at: String = row.get(4)?;
    let issue_count: i64 = row.get(5)?;
    Ok(CommitInfo {
        hash: row.get(0)?,
        parent: row.get(1)?,
        message: row.get(2)?,
        author: row.get(3)?,
        committed_at: parse_datetime(&committed_at),
        issue_count: usize::try_from(issue_count).unwrap_or(0),
    })
}

fn commit_hash(
    parent: Option<&str>,
    author: &str,
    committed_at: DateTime<Utc>,
    message: &str,
    issues: &[Issue],
) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(format!("parent {}\n", parent.unwrap_or("")));
    hasher.update(format!("author {author}\n"));
    hasher.update(format!("date {}\n\n", committed_at.to_rfc3339()));
    hasher.update(message.as_bytes());
    hasher.update(b"\n");
    for issue in issues {
        hasher.update(serde_json::to_vec(issue)?);
        hasher.update(b"\n");
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Utc.from_utc_datetime(&naive);
    }

    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::introspect::{column_exists, index_exists};
    use crate::storage::migrations::MigrationOutcome;
    use tempfile::TempDir;

    fn storage_with(ids: &[&str]) -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for id in ids {
            storage
                .create_issue(&Issue::new(*id, format!("Issue {id}")), "tester")
                .unwrap();
        }
        storage
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_create_and_get_issue() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut issue = Issue::new("bd-1", "Ping the service");
        issue.ephemeral = true;
        issue.wisp_type = Some(WispType::Ping);
        storage.create_issue(&issue, "tester").unwrap();

        let loaded = storage.get_issue("bd-1").unwrap().unwrap();
        assert_eq!(loaded, issue);
        assert!(storage.get_issue("bd-missing").unwrap().is_none());
    }

    #[test]
    fn test_create_rejects_collision() {
        let mut storage = storage_with(&["bd-1"]);
        let err = storage
            .create_issue(&Issue::new("bd-1", "Again"), "tester")
            .unwrap_err();
        assert!(matches!(err, BeadsError::IdCollision { id } if id == "bd-1"));
        assert_eq!(storage.count_issues().unwrap(), 1);
    }

    #[test]
    fn test_create_validates_title() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage
            .create_issue(&Issue::new("bd-1", "   "), "tester")
            .unwrap_err();
        assert!(matches!(err, BeadsError::Validation { .. }));

        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(storage.create_issue(&Issue::new("bd-1", long), "tester").is_err());
    }

    #[test]
    fn test_delete_issue_leaves_children() {
        let mut storage = storage_with(&["bd-1", "bd-1.1"]);
        let deleted = storage.delete_issue("bd-1", "tester").unwrap();
        assert_eq!(deleted.id, "bd-1");
        assert!(!storage.id_exists("bd-1").unwrap());
        assert!(storage.id_exists("bd-1.1").unwrap());

        let err = storage.delete_issue("bd-1", "tester").unwrap_err();
        assert!(matches!(err, BeadsError::IssueNotFound { .. }));
    }

    #[test]
    fn test_delete_issues_is_all_or_nothing() {
        let mut storage = storage_with(&["bd-1", "bd-2"]);
        let err = storage
            .delete_issues(&["bd-1", "bd-missing", "bd-2"], "tester")
            .unwrap_err();
        assert!(matches!(err, BeadsError::IssueNotFound { ref id } if id == "bd-missing"));
        assert!(storage.id_exists("bd-1").unwrap());
        assert!(storage.id_exists("bd-2").unwrap());
        assert!(storage.get_dirty_issue_ids().unwrap().iter().all(|id| id != "bd-missing"));

        let deleted = storage.delete_issues(&["bd-1", "bd-2"], "tester").unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(storage.count_issues().unwrap(), 0);
    }

    #[test]
    fn test_delete_issues_rolls_back_when_store_fails_midway() {
        let mut storage = storage_with(&["bd-1", "bd-2"]);
        storage
            .connection()
            .execute_batch(
                "CREATE TRIGGER refuse_bd2 BEFORE DELETE ON issues WHEN old.id = 'bd-2'
                 BEGIN SELECT RAISE(ABORT, 'refused'); END;",
            )
            .unwrap();

        assert!(storage.delete_issues(&["bd-1", "bd-2"], "tester").is_err());
        assert!(storage.id_exists("bd-1").unwrap());
        assert!(storage.id_exists("bd-2").unwrap());
    }

    #[test]
    fn test_next_child_id_skips_existing_and_deleted() {
        let mut storage = storage_with(&["bd-1", "bd-1.1"]);

        let first = storage.next_child_id("bd-1").unwrap();
        assert_eq!(first, "bd-1.2");
        storage
            .create_issue(&Issue::new(first.clone(), "Child"), "tester")
            .unwrap();
        storage.delete_issue(&first, "tester").unwrap();

        assert_eq!(storage.next_child_id("bd-1").unwrap(), "bd-1.3");
        assert!(matches!(
            storage.next_child_id("bd-nope").unwrap_err(),
            BeadsError::IssueNotFound { .. }
        ));
    }

    #[test]
    fn test_mutations_mark_dirty() {
        let mut storage = storage_with(&["bd-1", "bd-2"]);
        let mut dirty = storage.get_dirty_issue_ids().unwrap();
        dirty.sort();
        assert_eq!(dirty, vec!["bd-1".to_string(), "bd-2".to_string()]);
    }

    #[test]
    fn test_commit_clears_dirty_and_chains() {
        let mut storage = storage_with(&["bd-1"]);

        let first = storage.commit("first", "alice").unwrap();
        assert_eq!(first.parent, None);
        assert_eq!(first.issue_count, 1);
        assert_eq!(first.hash.len(), 64);
        assert!(storage.get_dirty_issue_ids().unwrap().is_empty());
        assert_eq!(
            storage.get_metadata(HEAD_COMMIT_KEY).unwrap().as_deref(),
            Some(first.hash.as_str())
        );

        storage
            .create_issue(&Issue::new("bd-2", "Second"), "alice")
            .unwrap();
        let second = storage.commit("second", "alice").unwrap();
        assert_eq!(second.parent.as_deref(), Some(first.hash.as_str()));
        assert_eq!(storage.head_commit().unwrap().unwrap().hash, second.hash);

        let log = storage.list_commits(10).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "second");
        assert_eq!(log[1].message, "first");
    }

    #[test]
    fn test_commit_with_nothing_pending() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage.commit("empty", "alice").unwrap_err();
        assert!(err.is_nothing_to_commit());

        let mut storage = storage_with(&["bd-1"]);
        storage.commit("first", "alice").unwrap();
        let err = storage.commit("again", "alice").unwrap_err();
        assert!(matches!(err, BeadsError::NothingToCommit));
        assert_eq!(storage.list_commits(10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_is_committable() {
        let mut storage = storage_with(&["bd-1"]);
        storage.commit("create", "alice").unwrap();
        storage.delete_issue("bd-1", "alice").unwrap();

        let commit = storage.commit("delete", "alice").unwrap();
        assert_eq!(commit.issue_count, 0);
    }

    #[test]
    fn test_remotes_crud() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(!storage.has_remote("origin").unwrap());

        storage.add_remote("origin", "/tmp/remote.db").unwrap();
        assert!(storage.has_remote("origin").unwrap());
        assert!(matches!(
            storage.add_remote("origin", "/elsewhere").unwrap_err(),
            BeadsError::RemoteExists { .. }
        ));
        assert!(storage.add_remote("bad name", "/x").is_err());

        storage.add_remote("backup", "file:///tmp/backup.db").unwrap();
        let names: Vec<_> = storage
            .list_remotes()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["backup".to_string(), "origin".to_string()]);

        storage.remove_remote("origin").unwrap();
        assert!(!storage.has_remote("origin").unwrap());
        assert!(matches!(
            storage.remove_remote("origin").unwrap_err(),
            BeadsError::RemoteNotFound { .. }
        ));
    }

    #[test]
    fn test_push_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let remote_path = dir.path().join("remotes").join("origin.db");

        let mut storage = storage_with(&["bd-1", "bd-2"]);
        let commit = storage.commit("snapshot", "alice").unwrap();
        storage
            .add_remote("origin", &format!("file://{}", remote_path.display()))
            .unwrap();

        let pushed = storage.push("origin").unwrap();
        assert_eq!(pushed.head.as_deref(), Some(commit.hash.as_str()));
        assert!(remote_path.exists());
        assert_eq!(
            storage
                .get_metadata(&pushed_head_key("origin"))
                .unwrap()
                .as_deref(),
            Some(commit.hash.as_str())
        );

        let remote = SqliteStorage::open(&remote_path).unwrap();
        assert_eq!(remote.count_issues().unwrap(), 2);
        assert_eq!(remote.head_commit().unwrap().unwrap().hash, commit.hash);
    }

    #[test]
    fn test_push_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let remote_path = dir.path().join("origin.db");

        let mut storage = storage_with(&["bd-1"]);
        storage
            .add_remote("origin", remote_path.to_str().unwrap())
            .unwrap();
        storage.push("origin").unwrap();

        storage
            .create_issue(&Issue::new("bd-2", "More"), "alice")
            .unwrap();
        storage.commit("more", "alice").unwrap();
        storage.push("origin").unwrap();

        let remote = SqliteStorage::open(&remote_path).unwrap();
        assert_eq!(remote.count_issues().unwrap(), 2);
    }

    #[test]
    fn test_push_unknown_remote() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage.push("origin").unwrap_err();
        assert!(matches!(err, BeadsError::RemoteNotFound { name } if name == "origin"));
    }

    #[test]
    fn test_push_rejects_network_urls() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .add_remote("origin", "https://example.com/beads.db")
            .unwrap();
        assert!(matches!(
            storage.push("origin").unwrap_err(),
            BeadsError::Config(_)
        ));
    }

    #[test]
    fn test_export_list_excludes_ephemeral() {
        let mut storage = storage_with(&["bd-b", "bd-a"]);
        let mut wisp = Issue::new("bd-w", "Heartbeat");
        wisp.ephemeral = true;
        wisp.wisp_type = Some(WispType::Heartbeat);
        storage.create_issue(&wisp, "tester").unwrap();

        let ids: Vec<_> = storage
            .get_all_issues_for_export()
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["bd-a".to_string(), "bd-b".to_string()]);
        assert!(storage.get_issue("bd-w").unwrap().is_some());
    }

    #[test]
    fn test_open_migrates_old_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE issues (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'open',
                    ephemeral INTEGER DEFAULT 0,
                    pinned INTEGER DEFAULT 0
                );
                INSERT INTO issues (id, title) VALUES ('bd-old', 'Old row');",
            )
            .unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(
            storage.migration_report().outcome_of("wisp_type_column"),
            Some(MigrationOutcome::Applied)
        );
        assert!(column_exists(storage.connection(), "issues", "wisp_type").unwrap());
        assert!(index_exists(storage.connection(), "idx_issues_wisp_type").unwrap());

        let old = storage.get_issue("bd-old").unwrap().unwrap();
        assert_eq!(old.wisp_type, None);
        drop(storage);

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.migration_report().applied_count(), 0);
    }

    #[test]
    fn test_config_and_metadata() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.set_config("issue_prefix", "bd").unwrap();
        storage.set_config("issue_prefix", "br").unwrap();
        assert_eq!(
            storage.get_config("issue_prefix").unwrap().as_deref(),
            Some("br")
        );
        assert_eq!(storage.get_all_config().unwrap().len(), 1);

        storage.set_metadata("k", "v").unwrap();
        assert_eq!(storage.get_metadata("k").unwrap().as_deref(), Some("v"));
        assert!(storage.delete_metadata("k").unwrap());
        assert!(storage.get_metadata("k").unwrap().is_none());
    }
}
