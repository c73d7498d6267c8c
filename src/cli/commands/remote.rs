use crate::cli::RemoteCommands;
use crate::config;
use crate::error::Result;
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};

/// Execute a remote subcommand.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened or the remote
/// operation fails (`RemoteExists`, `RemoteNotFound`).
pub fn execute(command: &RemoteCommands, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let beads_dir = config::discover_beads_dir(Some(Path::new(".")))?;
    let mut storage_ctx = config::open_storage_with_cli(&beads_dir, cli)?;
    let storage = &mut storage_ctx.storage;

    match command {
        RemoteCommands::Add { name, url } => {
            let url = normalize_remote_url(url)?;
            storage.add_remote(name, &url)?;
            if json {
                println!("{}", json!({ "added": name, "url": url }));
            } else {
                println!("Added remote {name}: {url}");
            }
        }
        RemoteCommands::Remove { name } => {
            storage.remove_remote(name)?;
            if json {
                println!("{}", json!({ "removed": name }));
            } else {
                println!("Removed remote {name}");
            }
        }
        RemoteCommands::List => {
            let remotes = storage.list_remotes()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&remotes)?);
            } else if remotes.is_empty() {
                println!("No remotes configured");
            } else {
                for remote in &remotes {
                    println!("{}\t{}", remote.name, remote.url);
                }
            }
        }
    }
    Ok(())
}

/// Relative paths are stored absolute so pushes work from any directory.
fn normalize_remote_url(url: &str) -> Result<String> {
    if url.contains("://") {
        return Ok(url.to_string());
    }
    let path = PathBuf::from(url);
    if path.is_absolute() {
        return Ok(url.to_string());
    }
    Ok(env::current_dir()?.join(path).to_string_lossy().into_owned())
}
