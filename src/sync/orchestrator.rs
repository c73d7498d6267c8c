//! The sync pipeline: commit, then export (mirror mode only), then push.
//!
//! Each step ends `Ok`, `Skipped`, `Warning`, or `Fatal`. A failing step is a
//! warning, including a locked or read-only store, and the later steps still
//! run. The driver halts only on `Fatal`, which no store error produces.
//! Nothing here returns `Err`; the outcome is the [`SyncReport`].

use super::SyncStore;
use crate::error::BeadsError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Remote that sync pushes to.
pub const DEFAULT_REMOTE: &str = "origin";

/// Whether a JSONL mirror is kept beside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// The store is authoritative; no JSONL mirror.
    Native,
    /// A JSONL export is kept in sync with the store.
    #[default]
    Mirror,
}

impl SyncMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Mirror => "mirror",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = BeadsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "dolt-native" => Ok(Self::Native),
            "" | "mirror" | "git-portable" => Ok(Self::Mirror),
            other => Err(BeadsError::Config(format!(
                "invalid sync.mode '{other}' (expected native or mirror)"
            ))),
        }
    }
}

/// Inputs for one sync run.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub actor: String,
    pub mode: SyncMode,
    pub jsonl_path: PathBuf,
    pub remote: String,
}

impl SyncPlan {
    #[must_use]
    pub fn new(actor: impl Into<String>, mode: SyncMode, jsonl_path: impl Into<PathBuf>) -> Self {
        Self {
            actor: actor.into(),
            mode,
            jsonl_path: jsonl_path.into(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    #[must_use]
    pub fn commit_message(&self) -> String {
        format!("br sync (auto-commit) by {}", self.actor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Commit,
    Export,
    Push,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Commit => "commit",
            Self::Export => "export",
            Self::Push => "push",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Skipped,
    Warning,
    /// Stops the pipeline. Step failures never map here.
    Fatal,
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: SyncStep,
    pub status: StepStatus,
    pub message: String,
}

impl StepReport {
    fn new(step: SyncStep, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step,
            status,
            message: message.into(),
        }
    }

    fn failed(step: SyncStep, err: &BeadsError) -> Self {
        Self::new(step, StepStatus::Warning, err.to_string())
    }
}

/// Outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// False when there was no store to sync.
    pub performed: bool,
    pub mode: SyncMode,
    pub steps: Vec<StepReport>,
}

impl SyncReport {
    const fn new(performed: bool, mode: SyncMode) -> Self {
        Self {
            performed,
            mode,
            steps: Vec::new(),
        }
    }

    /// Steps that ended in a warning.
    #[must_use]
    pub fn warnings(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Warning)
            .collect()
    }

    /// True unless a step was fatal.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Fatal)
    }

    #[must_use]
    pub fn step(&self, step: SyncStep) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Did the push step complete?
    #[must_use]
    pub fn pushed(&self) -> bool {
        self.step(SyncStep::Push)
            .is_some_and(|s| s.status == StepStatus::Ok)
    }

    /// Append a step, logging it. Returns false if the pipeline must stop.
    fn record(&mut self, report: StepReport) -> bool {
        match report.status {
            StepStatus::Ok => info!(step = %report.step, "{}", report.message),
            StepStatus::Skipped => debug!(step = %report.step, "skipped: {}", report.message),
            StepStatus::Warning => warn!(step = %report.step, "{} failed: {}", report.step, report.message),
            StepStatus::Fatal => error!(step = %report.step, "{} failed: {}", report.step, report.message),
        }
        let keep_going = report.status != StepStatus::Fatal;
        self.steps.push(report);
        keep_going
    }
}

/// Run the sync pipeline.
///
/// With no store (no workspace), returns a report with `performed == false`.
pub fn run_sync<S: SyncStore + ?Sized>(store: Option<&mut S>, plan: &SyncPlan) -> SyncReport {
    let Some(store) = store else {
        debug!("No store available; nothing to sync");
        return SyncReport::new(false, plan.mode);
    };

    let mut report = SyncReport::new(true, plan.mode);
    debug!(mode = %plan.mode, actor = %plan.actor, "Starting sync");

    if !report.record(commit_step(store, plan)) {
        return report;
    }

    let export = match plan.mode {
        SyncMode::Native => StepReport::new(
            SyncStep::Export,
            StepStatus::Skipped,
            "native mode keeps no JSONL mirror",
        ),
        SyncMode::Mirror => export_step(store, plan),
    };
    if !report.record(export) {
        return report;
    }

    report.record(push_step(store, plan));
    report
}

fn commit_step<S: SyncStore + ?Sized>(store: &mut S, plan: &SyncPlan) -> StepReport {
    match store.commit(&plan.commit_message(), &plan.actor) {
        Ok(commit) => StepReport::new(
            SyncStep::Commit,
            StepStatus::Ok,
            format!("committed {}", short_hash(&commit.hash)),
        ),
        Err(err) if err.is_nothing_to_commit() => {
            StepReport::new(SyncStep::Commit, StepStatus::Ok, "nothing to commit")
        }
        Err(err) => StepReport::failed(SyncStep::Commit, &err),
    }
}

fn export_step<S: SyncStore + ?Sized>(store: &mut S, plan: &SyncPlan) -> StepReport {
    match store.export_jsonl(&plan.jsonl_path) {
        Ok(result) => StepReport::new(
            SyncStep::Export,
            StepStatus::Ok,
            format!(
                "exported {} issue(s) to {}",
                result.exported_count, result.output_path
            ),
        ),
        Err(err) => StepReport::failed(SyncStep::Export, &err),
    }
}

fn push_step<S: SyncStore + ?Sized>(store: &mut S, plan: &SyncPlan) -> StepReport {
    match store.has_remote(&plan.remote) {
        Ok(true) => {}
        Ok(false) => {
            return StepReport::new(
                SyncStep::Push,
                StepStatus::Skipped,
                format!("no remote '{}' configured", plan.remote),
            );
        }
        Err(err) => {
            debug!(error = %err, "Remote lookup failed; not pushing");
            return StepReport::new(
                SyncStep::Push,
                StepStatus::Skipped,
                format!("could not look up remote '{}': {err}", plan.remote),
            );
        }
    }

    match store.push(&plan.remote) {
        Ok(pushed) => StepReport::new(
            SyncStep::Push,
            StepStatus::Ok,
            format!("pushed to remote {}", pushed.remote),
        ),
        Err(err) => StepReport::failed(SyncStep::Push, &err),
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
