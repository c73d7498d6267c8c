use crate::config::Metadata;
use crate::error::{BeadsError, Result};
use crate::storage::SqliteStorage;
use std::fs;
use std::path::Path;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn execute(prefix: Option<String>, force: bool, root_dir: Option<&Path>) -> Result<()> {
    let base_dir = root_dir.unwrap_or_else(|| Path::new("."));
    let beads_dir = base_dir.join(".beads");
    let metadata = Metadata::default();
    let db_path = beads_dir.join(&metadata.database);

    if beads_dir.exists() {
        if db_path.exists() && !force {
            return Err(BeadsError::AlreadyInitialized { path: db_path });
        }
    } else {
        fs::create_dir(&beads_dir)?;
    }

    // Opening applies the schema and migrations
    let mut storage = SqliteStorage::open(&db_path)?;

    if let Some(p) = prefix {
        storage.set_config("issue_prefix", &p)?;
        println!("Prefix set to: {p}");
    }

    if !beads_dir.join("metadata.json").exists() || force {
        metadata.save(&beads_dir)?;
    }

    let config_path = beads_dir.join("config.yaml");
    if !config_path.exists() {
        let config = r"# Beads Project Configuration
# issue_prefix: bd
#
# Sync mode: mirror keeps .beads/issues.jsonl beside the database,
# native skips the JSONL export.
# sync:
#   mode: mirror
";
        fs::write(config_path, config)?;
    }

    let gitignore_path = beads_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let gitignore = r"# Database
*.db
*.db-shm
*.db-wal

# Temporary
*.tmp
";
        fs::write(gitignore_path, gitignore)?;
    }

    tracing::info!(path = %beads_dir.display(), "Initialized workspace");
    println!("Initialized beads workspace in .beads/");
    Ok(())
}
