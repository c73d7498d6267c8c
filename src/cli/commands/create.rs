use crate::cli::CreateArgs;
use crate::config;
use crate::error::{BeadsError, Result};
use crate::model::{Issue, Status, WispType};
use crate::util::id::IdGenerator;
use chrono::Utc;
use std::path::Path;

/// Execute the create command.
///
/// # Errors
///
/// Returns an error if validation fails, the database cannot be opened, or the issue cannot be created.
pub fn execute(args: CreateArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let title = args.title.trim().to_string();
    if title.is_empty() {
        return Err(BeadsError::validation("title", "cannot be empty"));
    }

    let status = args
        .status
        .as_deref()
        .map(str::parse::<Status>)
        .transpose()?
        .unwrap_or_default();
    let wisp_type = args
        .wisp_type
        .as_deref()
        .map(str::parse::<WispType>)
        .transpose()?;

    let beads_dir = config::discover_beads_dir(Some(Path::new(".")))?;
    let mut storage_ctx = config::open_storage_with_cli(&beads_dir, cli)?;
    let layer = config::load_config(&beads_dir, Some(&storage_ctx.storage), cli)?;
    let actor = config::resolve_actor(&layer);
    let storage = &mut storage_ctx.storage;

    let id = if let Some(id) = args.id {
        id
    } else if let Some(parent) = args.parent.as_deref() {
        storage.next_child_id(parent)?
    } else {
        let id_gen = IdGenerator::new(config::id_config_from_layer(&layer));
        let count = storage.count_issues()?;
        id_gen.generate(&title, &actor, Utc::now(), count, |id| {
            storage.id_exists(id).unwrap_or(false)
        })
    };

    let issue = Issue {
        id,
        title,
        status,
        // A wisp type only makes sense on a wisp
        ephemeral: args.ephemeral || wisp_type.is_some(),
        pinned: args.pinned,
        wisp_type,
    };
    storage.create_issue(&issue, &actor)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issue)?);
    } else {
        println!("Created {}: {}", issue.id, issue.title);
    }
    Ok(())
}
