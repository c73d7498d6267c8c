//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Issue store with schema migrations and sync (`SQLite` + JSONL)
#[derive(Parser, Debug)]
#[command(name = "br", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (auto-discover .beads/*.db if not set)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Actor name recorded on commits
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// `SQLite` busy timeout in ms
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a beads workspace
    Init {
        /// Issue ID prefix (e.g., "bd")
        #[arg(long)]
        prefix: Option<String>,

        /// Overwrite existing DB
        #[arg(long)]
        force: bool,
    },

    /// Create a new issue
    Create(CreateArgs),

    /// Delete issues (hard delete; children are left in place)
    Delete(DeleteArgs),

    /// List child issues whose parent no longer exists
    Orphans,

    /// Run schema migrations and show what changed
    Migrate,

    /// Manage remotes
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Commit pending changes, refresh the JSONL mirror, and push to origin
    #[command(long_about = "Commit pending changes, refresh the JSONL mirror, and push to origin.

STEPS:
  1. Commit pending changes (\"nothing to commit\" is fine)
  2. Export .beads/issues.jsonl (mirror mode only; skipped when sync.mode is native)
  3. Push to remote 'origin' if one is configured

Failures in any step are reported as warnings and the remaining steps still run.
Only a locked or read-only database stops the sync early.

Outside a beads workspace there is nothing to sync and the command exits 0.")]
    Sync(SyncArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CreateArgs {
    /// Issue title
    pub title: String,

    /// Explicit issue ID (generated when omitted)
    #[arg(long, conflicts_with = "parent")]
    pub id: Option<String>,

    /// Parent issue ID (creates the next child `<parent>.<n>`)
    #[arg(long)]
    pub parent: Option<String>,

    /// Initial status
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Mark as ephemeral (not exported to JSONL)
    #[arg(long)]
    pub ephemeral: bool,

    /// Pin the issue
    #[arg(long)]
    pub pinned: bool,

    /// Wisp category (heartbeat, ping, patrol, `gc_report`, ...)
    #[arg(long)]
    pub wisp_type: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteArgs {
    /// Issue IDs to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoteCommands {
    /// Add a remote (filesystem path or file:// URL)
    Add {
        /// Remote name
        name: String,
        /// Remote location
        url: String,
    },
    /// Remove a remote
    #[command(alias = "rm")]
    Remove {
        /// Remote name
        name: String,
    },
    /// List remotes
    List,
}

/// Arguments for the sync command.
///
/// The flags below are accepted for compatibility with older scripts and
/// have no effect.
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SyncArgs {
    #[arg(long, short = 'm', hide = true)]
    pub message: Option<String>,

    #[arg(long, hide = true)]
    pub dry_run: bool,

    #[arg(long, hide = true)]
    pub no_push: bool,

    #[arg(long, hide = true)]
    pub import: bool,

    #[arg(long, hide = true)]
    pub import_only: bool,

    #[arg(long, hide = true)]
    pub export: bool,

    #[arg(long, hide = true)]
    pub flush_only: bool,

    #[arg(long, hide = true)]
    pub pull: bool,

    #[arg(long, hide = true)]
    pub no_git_history: bool,
}

impl SyncArgs {
    /// Names of deprecated flags that were passed.
    #[must_use]
    pub fn deprecated_flags(&self) -> Vec<&'static str> {
        [
            (self.message.is_some(), "--message"),
            (self.dry_run, "--dry-run"),
            (self.no_push, "--no-push"),
            (self.import, "--import"),
            (self.import_only, "--import-only"),
            (self.export, "--export"),
            (self.flush_only, "--flush-only"),
            (self.pull, "--pull"),
            (self.no_git_history, "--no-git-history"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}
