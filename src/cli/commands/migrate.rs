use crate::config;
use crate::error::Result;
use crate::storage::{MigrationOutcome, MigrationReport};
use std::path::Path;

/// Execute the migrate command.
///
/// Opening storage already brings the schema up to date, so the explicit
/// run here normally finds nothing to do. Changes made during the open are
/// merged into the printed report.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened or a migration fails.
pub fn execute(json: bool, cli: &config::CliOverrides) -> Result<()> {
    let beads_dir = config::discover_beads_dir(Some(Path::new(".")))?;
    let mut storage_ctx = config::open_storage_with_cli(&beads_dir, cli)?;
    let on_open = storage_ctx.storage.migration_report().clone();
    let report = storage_ctx.storage.run_migrations()?;

    if json {
        let payload = serde_json::json!({
            "on_open": on_open,
            "migrations": report.migrations,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    print!("{}", render_text(&on_open, &report));
    Ok(())
}

fn render_text(on_open: &MigrationReport, report: &MigrationReport) -> String {
    let mut out = String::new();
    for entry in &report.migrations {
        // Credit changes made while opening to the migration that made them
        let outcome = match on_open.outcome_of(entry.name) {
            Some(MigrationOutcome::Applied) => MigrationOutcome::Applied,
            _ => entry.outcome,
        };
        let label = match outcome {
            MigrationOutcome::Applied => "applied",
            MigrationOutcome::AlreadyApplied => "already applied",
            MigrationOutcome::Advisory => "checked",
        };
        out.push_str(&format!("  {:<20} {label}\n", entry.name));
    }

    let applied = on_open.applied_count() + report.applied_count();
    if applied == 0 {
        out.push_str("Schema is up to date\n");
    } else {
        out.push_str(&format!("Applied {applied} migration(s)\n"));
    }
    out
}
