//! Sync command implementation.
//!
//! Drives the sync pipeline against the workspace store and reports the
//! outcome. Step failures, a locked store included, are printed as warnings
//! and do not change the exit code.

use crate::cli::SyncArgs;
use crate::config;
use crate::error::{BeadsError, Result};
use crate::storage::SqliteStorage;
use crate::sync::{DEFAULT_REMOTE, SyncMode, SyncPlan, SyncReport, run_sync};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Execute the sync command.
///
/// Outside a beads workspace there is nothing to sync; that is a no-op, not
/// an error.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or `sync.mode` is invalid.
pub fn execute(args: &SyncArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    for flag in args.deprecated_flags() {
        debug!(flag, "Ignoring deprecated sync flag");
    }

    let beads_dir = match config::discover_beads_dir(Some(Path::new("."))) {
        Ok(dir) => dir,
        Err(BeadsError::NotInitialized) => {
            let plan = SyncPlan::new("", SyncMode::default(), PathBuf::new());
            let report = run_sync::<SqliteStorage>(None, &plan);
            return print_report(&report, json);
        }
        Err(err) => return Err(err),
    };

    let mut storage_ctx = config::open_storage_with_cli(&beads_dir, cli)?;
    let layer = config::load_config(&beads_dir, Some(&storage_ctx.storage), cli)?;
    let mode = config::sync_mode_from_layer(&layer)?;
    let actor = config::resolve_actor(&layer);
    let plan = SyncPlan::new(actor, mode, storage_ctx.paths.jsonl_path.clone());

    let report = run_sync(Some(&mut storage_ctx.storage), &plan);
    print_report(&report, json)
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for line in report_lines(report) {
        eprintln!("{line}");
    }
    Ok(())
}

/// Human-readable lines for stderr.
///
/// Each failed step was already logged at warn level by the pipeline; this
/// adds the summary.
fn report_lines(report: &SyncReport) -> Vec<String> {
    if !report.performed {
        return vec!["Nothing to sync (no beads workspace found)".to_string()];
    }

    let mut lines = Vec::new();
    let warnings = report.warnings();
    if !warnings.is_empty() {
        let failed: Vec<String> = warnings.iter().map(|w| w.step.to_string()).collect();
        lines.push(format!(
            "Warning: sync completed with {} failed step(s): {}",
            warnings.len(),
            failed.join(", ")
        ));
    }
    if report.pushed() {
        lines.push(format!("Pushed to remote {DEFAULT_REMOTE}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{StepReport, StepStatus, SyncStep};

    fn report(steps: Vec<StepReport>) -> SyncReport {
        SyncReport {
            performed: true,
            mode: SyncMode::Mirror,
            steps,
        }
    }

    fn step(step: SyncStep, status: StepStatus, message: &str) -> StepReport {
        StepReport {
            step,
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn no_workspace_message() {
        let report = SyncReport {
            performed: false,
            mode: SyncMode::Mirror,
            steps: Vec::new(),
        };
        assert_eq!(
            report_lines(&report),
            vec!["Nothing to sync (no beads workspace found)"]
        );
    }

    #[test]
    fn clean_run_prints_push_only() {
        let lines = report_lines(&report(vec![
            step(SyncStep::Commit, StepStatus::Ok, "nothing to commit"),
            step(SyncStep::Export, StepStatus::Ok, "exported 1 issue(s)"),
            step(SyncStep::Push, StepStatus::Ok, "pushed to remote origin"),
        ]));
        assert_eq!(lines, vec!["Pushed to remote origin"]);
    }

    #[test]
    fn warnings_summarized_in_step_order() {
        let lines = report_lines(&report(vec![
            step(SyncStep::Commit, StepStatus::Warning, "disk full"),
            step(SyncStep::Export, StepStatus::Warning, "permission denied"),
            step(SyncStep::Push, StepStatus::Skipped, "no remote 'origin'"),
        ]));
        assert_eq!(
            lines,
            vec!["Warning: sync completed with 2 failed step(s): commit, export"]
        );
    }

    #[test]
    fn locked_commit_still_reports_push() {
        let lines = report_lines(&report(vec![
            step(SyncStep::Commit, StepStatus::Warning, "database is locked"),
            step(SyncStep::Export, StepStatus::Ok, "exported 1 issue(s)"),
            step(SyncStep::Push, StepStatus::Ok, "pushed to remote origin"),
        ]));
        assert_eq!(
            lines,
            vec![
                "Warning: sync completed with 1 failed step(s): commit",
                "Pushed to remote origin"
            ]
        );
    }
}
