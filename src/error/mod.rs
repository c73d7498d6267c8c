//! Error types and handling for `beads_sync`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Supports `anyhow` integration via [`BeadsError::Other`]
//! - Classifies errors for the sync pipeline: benign (`nothing to commit`),
//!   store-unavailable (halts the pipeline), and everything else (warning)
//! - Provides structured JSON output for scripted callers

mod context;
mod structured;

pub use context::{OptionExt, ResultExt};
pub use structured::{ErrorCode, StructuredError};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `beads_sync` operations.
#[derive(Error, Debug)]
pub enum BeadsError {
    // === Storage Errors ===
    /// Database is locked by another process.
    #[error("Database is locked: {path}")]
    DatabaseLocked { path: PathBuf },

    /// `SQLite` database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("Migration '{name}' failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<Self>,
    },

    // === Versioned Store Errors ===
    /// Commit was requested but no changes are pending.
    #[error("nothing to commit, working set clean")]
    NothingToCommit,

    /// Named remote is not configured.
    #[error("Remote not found: {name}")]
    RemoteNotFound { name: String },

    /// Named remote already exists.
    #[error("Remote already exists: {name}")]
    RemoteExists { name: String },

    // === Issue Errors ===
    /// Issue with the specified ID was not found.
    #[error("Issue not found: {id}")]
    IssueNotFound { id: String },

    /// Attempted to create an issue with an ID that already exists.
    #[error("Issue ID collision: {id}")]
    IdCollision { id: String },

    /// Issue ID format is invalid.
    #[error("Invalid issue ID format: {id}")]
    InvalidId { id: String },

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Invalid status value.
    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    // === Configuration Errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Beads workspace not initialized.
    #[error("Beads not initialized: run 'br init' first")]
    NotInitialized,

    /// Already initialized.
    #[error("Already initialized at '{path}'")]
    AlreadyInitialized { path: PathBuf },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BeadsError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::IssueNotFound { .. }
                | Self::Validation { .. }
                | Self::InvalidStatus { .. }
                | Self::InvalidId { .. }
                | Self::RemoteNotFound { .. }
                | Self::RemoteExists { .. }
        )
    }

    /// Is this the benign "no pending changes" outcome of a commit?
    ///
    /// Looks through context wrappers so callers can add context freely.
    #[must_use]
    pub fn is_nothing_to_commit(&self) -> bool {
        match self {
            Self::NothingToCommit => true,
            Self::WithContext { source, .. } => source
                .downcast_ref::<Self>()
                .is_some_and(Self::is_nothing_to_commit),
            _ => false,
        }
    }

    /// Does this error mean the store handle cannot be written right now?
    ///
    /// True for an explicit lock error and for `SQLite` busy/locked/read-only
    /// failures.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::DatabaseLocked { .. } => true,
            Self::Database(err) => sqlite_unavailable(err),
            Self::Migration { source, .. } => source.is_store_unavailable(),
            Self::WithContext { source, .. } => {
                if let Some(inner) = source.downcast_ref::<Self>() {
                    inner.is_store_unavailable()
                } else {
                    source
                        .downcast_ref::<rusqlite::Error>()
                        .is_some_and(sqlite_unavailable)
                }
            }
            _ => false,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run: br init"),
            Self::AlreadyInitialized { .. } => Some("Use --force to reinitialize"),
            Self::RemoteNotFound { .. } => Some("Add one with: br remote add origin <path>"),
            Self::RemoteExists { .. } => Some("Remove it first with: br remote remove <name>"),
            Self::InvalidStatus { .. } => {
                Some("Valid statuses: open, in_progress, blocked, deferred, closed")
            }
            Self::DatabaseLocked { .. } => Some("Retry, or raise --lock-timeout"),
            _ => None,
        }
    }

    /// Wrap a failure from a named migration.
    #[must_use]
    pub fn migration(name: impl Into<String>, source: Self) -> Self {
        Self::Migration {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn sqlite_unavailable(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if matches!(
            inner.code,
            rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::ReadOnly
        )
    )
}

/// Result type using `BeadsError`.
pub type Result<T> = std::result::Result<T, BeadsError>;
