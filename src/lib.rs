//! `beads_sync` - schema evolution, orphan detection, and sync orchestration
//! for a beads issue store.
//!
//! The crate is organized around four pieces that run at different points of
//! a process lifecycle:
//!
//! - [`storage::introspect`] answers table/column existence questions.
//! - [`storage::migrations`] brings the schema up to date on every open.
//! - [`storage::orphans`] reports child issues whose parent row is gone.
//! - [`sync::orchestrator`] runs the commit → export → push pipeline.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{BeadsError, ErrorCode, Result, StructuredError};
