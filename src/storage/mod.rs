//! Storage layer: `SQLite` store, schema bring-up, and migrations.

pub mod introspect;
pub mod migrations;
pub mod orphans;
pub mod schema;
pub mod sqlite;

pub use introspect::{column_exists, index_exists, table_exists};
pub use migrations::{MigrationOutcome, MigrationReport, run_migrations};
pub use orphans::{OrphanInfo, detect_orphaned_children, query_orphaned_children};
pub use sqlite::{CommitInfo, PushInfo, RemoteInfo, SqliteStorage};
