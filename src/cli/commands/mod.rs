//! Subcommand implementations.

pub mod create;
pub mod delete;
pub mod init;
pub mod migrate;
pub mod orphans;
pub mod remote;
pub mod sync;
