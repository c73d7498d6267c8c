//! JSONL export.
//!
//! The export is a derived interchange file: one issue per line, sorted by
//! ID, ephemeral issues left out. It is written to a temp file beside the
//! target and renamed into place.

use crate::error::{BeadsError, Result, ResultExt};
use crate::model::Issue;
use crate::storage::SqliteStorage;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Metadata key for the hash of the last exported JSONL content.
pub const METADATA_JSONL_CONTENT_HASH: &str = "jsonl_content_hash";
/// Metadata key for the time of the last export.
pub const METADATA_LAST_EXPORT_TIME: &str = "last_export_time";

/// Result of a JSONL export operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResult {
    /// Number of issues exported.
    pub exported_count: usize,
    /// IDs of exported issues.
    pub exported_ids: Vec<String>,
    /// SHA256 hash of the exported JSONL content.
    pub content_hash: String,
    /// Output file path.
    pub output_path: String,
}

/// Export issues from `SQLite` to JSONL format.
///
/// - Excludes ephemerals
/// - Sorts by ID for deterministic output
/// - Atomic write (temp file -> rename)
/// - Verifies the written line count and content hash
///
/// # Errors
///
/// Returns an error if the database read fails, the file cannot be written,
/// or verification finds a different number of lines than were written.
pub fn export_to_jsonl(storage: &SqliteStorage, output_path: &Path) -> Result<ExportResult> {
    let issues = storage.get_all_issues_for_export()?;

    let parent_dir = output_path.parent().ok_or_else(|| {
        BeadsError::Config(format!("Invalid output path: {}", output_path.display()))
    })?;
    if !parent_dir.as_os_str().is_empty() {
        fs::create_dir_all(parent_dir)
            .with_context(|| format!("failed to create {}", parent_dir.display()))?;
    }

    let temp_path = output_path.with_extension("jsonl.tmp");
    let temp_file = File::create(&temp_path)
        .with_context(|| format!("failed to create {}", temp_path.display()))?;
    let mut writer = BufWriter::new(temp_file);

    let (exported_ids, content_hash) = match write_issues(&mut writer, &issues) {
        Ok(written) => written,
        Err(err) => {
            drop(writer);
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
    };

    writer
        .into_inner()
        .map_err(|e| BeadsError::Io(e.into_error()))?
        .sync_all()?;

    fs::rename(&temp_path, output_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            output_path.display()
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        let _ = fs::set_permissions(output_path, perms);
    }

    let actual_count = count_issues_in_jsonl(output_path)?;
    if actual_count != exported_ids.len() {
        return Err(BeadsError::Config(format!(
            "Export verification failed: expected {} issues, JSONL has {} lines",
            exported_ids.len(),
            actual_count
        )));
    }
    let actual_hash = compute_jsonl_hash(output_path)?;
    if actual_hash != content_hash {
        return Err(BeadsError::Config(format!(
            "Export verification failed: content hash mismatch for {}",
            output_path.display()
        )));
    }

    tracing::debug!(
        path = %output_path.display(),
        count = exported_ids.len(),
        "Exported JSONL"
    );

    Ok(ExportResult {
        exported_count: exported_ids.len(),
        exported_ids,
        content_hash,
        output_path: output_path.to_string_lossy().to_string(),
    })
}

fn write_issues<W: Write>(writer: &mut W, issues: &[Issue]) -> Result<(Vec<String>, String)> {
    let mut hasher = Sha256::new();
    let mut exported_ids = Vec::with_capacity(issues.len());

    for issue in issues {
        let json = serde_json::to_string(issue)?;
        writeln!(writer, "{json}")?;
        hasher.update(json.as_bytes());
        hasher.update(b"\n");
        exported_ids.push(issue.id.clone());
    }
    writer.flush()?;

    Ok((exported_ids, format!("{:x}", hasher.finalize())))
}

/// Record a completed export in store metadata.
///
/// # Errors
///
/// Returns an error if database updates fail.
pub fn finalize_export(storage: &mut SqliteStorage, result: &ExportResult) -> Result<()> {
    storage.set_metadata(METADATA_JSONL_CONTENT_HASH, &result.content_hash)?;
    storage.set_metadata(METADATA_LAST_EXPORT_TIME, &Utc::now().to_rfc3339())?;
    Ok(())
}

/// Count issues in an existing JSONL file.
///
/// Returns 0 if the file doesn't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains invalid JSON.
pub fn count_issues_in_jsonl(path: &Path) -> Result<usize> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BeadsError::Io(e)),
    };

    let reader = BufReader::new(file);
    let mut count = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // Validate JSON without fully deserializing
        if serde_json::from_str::<serde_json::Value>(&line).is_err() {
            return Err(BeadsError::Config(format!(
                "Invalid JSON at line {}: {}",
                line_num + 1,
                line.chars().take(50).collect::<String>()
            )));
        }
        count += 1;
    }

    Ok(count)
}

/// Compute the SHA256 of a JSONL file, line by line.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_jsonl_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    for line in reader.lines() {
        let line = line?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    Ok(format!("{:x}", hasher.finalize()))
}
