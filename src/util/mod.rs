//! Shared utilities for `beads_sync`.

pub mod id;

pub use id::{CHILD_SEPARATOR, IdConfig, IdGenerator, child_id, first_separator_prefix, validate_id};
