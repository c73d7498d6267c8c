//! Issue ID generation and hierarchical ID helpers.
//!
//! Root IDs have the form `<prefix>-<hash>` where hash is base36 lowercase.
//! Child IDs append `.<n>` segments: `bd-abc.1`, `bd-abc.1.2`. The parent of
//! a child is encoded only in the string; nothing in the schema enforces it.

use crate::error::{BeadsError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Separator between a parent ID and a child suffix.
pub const CHILD_SEPARATOR: char = '.';

/// ID generation configuration.
#[derive(Debug, Clone)]
pub struct IdConfig {
    /// Issue ID prefix (e.g., "bd").
    pub prefix: String,
    /// Minimum hash length.
    pub min_hash_length: usize,
    /// Maximum hash length.
    pub max_hash_length: usize,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            prefix: "bd".to_string(),
            min_hash_length: 3,
            max_hash_length: 8,
        }
    }
}

impl IdConfig {
    /// Create a new ID config with the given prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }
}

/// ID generator that produces unique root issue IDs.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    config: IdConfig,
}

impl IdGenerator {
    #[must_use]
    pub const fn new(config: IdConfig) -> Self {
        Self { config }
    }

    /// Hash length for a store holding `issue_count` issues.
    ///
    /// Grows by one base36 character per 36x growth so short IDs stay
    /// short while collisions stay rare.
    #[must_use]
    pub fn length_for(&self, issue_count: usize) -> usize {
        let mut length = self.config.min_hash_length;
        let mut capacity = 36_usize.saturating_pow(u32::try_from(length).unwrap_or(u32::MAX)) / 8;
        while issue_count >= capacity && length < self.config.max_hash_length {
            length += 1;
            capacity = capacity.saturating_mul(36);
        }
        length
    }

    /// Generate an ID, checking for collisions with `exists`.
    pub fn generate<F>(
        &self,
        title: &str,
        creator: &str,
        created_at: DateTime<Utc>,
        issue_count: usize,
        exists: F,
    ) -> String
    where
        F: Fn(&str) -> bool,
    {
        let mut length = self.length_for(issue_count);
        let mut nonce: u32 = 0;
        loop {
            let seed = format!(
                "{title}|{creator}|{}|{nonce}",
                created_at.timestamp_nanos_opt().unwrap_or(0)
            );
            let id = format!("{}-{}", self.config.prefix, compute_id_hash(&seed, length));
            if !exists(&id) {
                return id;
            }
            nonce += 1;
            if nonce % 10 == 0 && length < self.config.max_hash_length {
                length += 1;
            }
        }
    }
}

/// Compute a base36 hash of the input string truncated to `length`.
#[must_use]
pub fn compute_id_hash(input: &str, length: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());

    let mut num = 0u64;
    for &byte in digest.iter().take(8) {
        num = (num << 8) | u64::from(byte);
    }

    let encoded = base36_encode(num);
    let padded = if encoded.len() < length {
        format!("{encoded:0>length$}")
    } else {
        encoded
    };
    padded.chars().take(length).collect()
}

fn base36_encode(mut num: u64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if num == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while num > 0 {
        chars.push(ALPHABET[(num % 36) as usize] as char);
        num /= 36;
    }
    chars.into_iter().rev().collect()
}

/// Generate child ID from parent: `<parent>.<n>`.
#[must_use]
pub fn child_id(parent_id: &str, child_number: u32) -> String {
    format!("{parent_id}{CHILD_SEPARATOR}{child_number}")
}

/// The text before the first separator, or `None` for root IDs.
///
/// This is the parent reference used by orphan detection. For `bd-a.1.2`
/// it returns `bd-a`, not `bd-a.1`.
#[must_use]
pub fn first_separator_prefix(id: &str) -> Option<&str> {
    id.split_once(CHILD_SEPARATOR).map(|(prefix, _)| prefix)
}

/// Validate an explicitly supplied issue ID.
///
/// # Errors
///
/// Returns `InvalidId` for empty IDs, IDs with whitespace, or IDs with an
/// empty segment around a separator.
pub fn validate_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id.chars().any(char::is_whitespace)
        || id.split(CHILD_SEPARATOR).any(str::is_empty);
    if invalid {
        return Err(BeadsError::InvalidId { id: id.to_string() });
    }
    Ok(())
}
