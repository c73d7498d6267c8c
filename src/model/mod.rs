//! Core data types for `beads_sync`.
//!
//! - `Issue` - The persisted work item
//! - `Status` - Issue lifecycle states
//! - `WispType` - Category of an ephemeral issue (wisp)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Issue lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
    #[serde(untagged)]
    Custom(String),
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Deferred => "deferred",
            Self::Closed => "closed",
            Self::Custom(value) => value,
        }
    }

    /// Parse a status read back from the database.
    ///
    /// Unknown values are kept as `Custom` rather than rejected, since rows
    /// may have been written by another tool.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        value
            .parse()
            .unwrap_or_else(|_| Self::Custom(value.to_string()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::error::BeadsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "deferred" => Ok(Self::Deferred),
            "closed" => Ok(Self::Closed),
            other => Err(crate::error::BeadsError::InvalidStatus {
                status: other.to_string(),
            }),
        }
    }
}

/// Category of an ephemeral issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WispType {
    Heartbeat,
    Ping,
    Patrol,
    GcReport,
    Recovery,
    Error,
    Escalation,
    #[serde(untagged)]
    Custom(String),
}

impl WispType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Ping => "ping",
            Self::Patrol => "patrol",
            Self::GcReport => "gc_report",
            Self::Recovery => "recovery",
            Self::Error => "error",
            Self::Escalation => "escalation",
            Self::Custom(value) => value,
        }
    }

    /// Map the stored column value to an optional wisp type.
    ///
    /// The column defaults to `''`, which means "not a wisp".
    #[must_use]
    pub fn from_db(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed {
            "heartbeat" => Self::Heartbeat,
            "ping" => Self::Ping,
            "patrol" => Self::Patrol,
            "gc_report" => Self::GcReport,
            "recovery" => Self::Recovery,
            "error" => Self::Error,
            "escalation" => Self::Escalation,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl fmt::Display for WispType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WispType {
    type Err = crate::error::BeadsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db(&s.to_lowercase())
            .ok_or_else(|| crate::error::BeadsError::validation("wisp_type", "cannot be empty"))
    }
}

/// The persisted issue row.
///
/// `id` is immutable once created. A child issue encodes its parent in the
/// ID (`<parent>.<n>`); there is no parent column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ephemeral: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wisp_type: Option<WispType>,
}

impl Issue {
    /// Create an open, non-ephemeral issue.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: Status::Open,
            ephemeral: false,
            pinned: false,
            wisp_type: None,
        }
    }

    /// True when this issue is a wisp (ephemeral, local-only).
    #[must_use]
    pub const fn is_wisp(&self) -> bool {
        self.ephemeral
    }
}
