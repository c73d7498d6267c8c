//! Synchronization: local commit, JSONL mirror, and remote push.
//!
//! The orchestrator talks to the store only through [`SyncStore`], so the
//! pipeline can be driven against `SqliteStorage` or a test double.

pub mod export;
pub mod orchestrator;

pub use export::{
    ExportResult, METADATA_JSONL_CONTENT_HASH, METADATA_LAST_EXPORT_TIME, count_issues_in_jsonl,
    compute_jsonl_hash, export_to_jsonl, finalize_export,
};
pub use orchestrator::{
    DEFAULT_REMOTE, StepReport, StepStatus, SyncMode, SyncPlan, SyncReport, SyncStep, run_sync,
};

use crate::error::Result;
use crate::storage::{CommitInfo, PushInfo, SqliteStorage};
use std::path::Path;

/// Store capabilities the sync pipeline needs.
///
/// Callers must hold the only handle for the duration of a sync.
pub trait SyncStore {
    /// Commit pending changes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BeadsError::NothingToCommit`] when nothing changed.
    fn commit(&mut self, message: &str, author: &str) -> Result<CommitInfo>;

    /// Is a remote with this name configured?
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn has_remote(&self, name: &str) -> Result<bool>;

    /// Push to a named remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote is missing or the push fails.
    fn push(&mut self, remote: &str) -> Result<PushInfo>;

    /// Write the JSONL mirror to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the export fails.
    fn export_jsonl(&mut self, path: &Path) -> Result<ExportResult>;
}

impl SyncStore for SqliteStorage {
    fn commit(&mut self, message: &str, author: &str) -> Result<CommitInfo> {
        Self::commit(self, message, author)
    }

    fn has_remote(&self, name: &str) -> Result<bool> {
        Self::has_remote(self, name)
    }

    fn push(&mut self, remote: &str) -> Result<PushInfo> {
        Self::push(self, remote)
    }

    fn export_jsonl(&mut self, path: &Path) -> Result<ExportResult> {
        let result = export_to_jsonl(self, path)?;
        finalize_export(self, &result)?;
        Ok(result)
    }
}
