//! Version management for kbox
//!
//! This crate holds the selected version of every tool, resolves `auto`
//! versions from live servers and validates changes before committing them.

pub mod extract;
mod query;
mod registry;

pub use query::{VersionQuery, own_version_probe, server_version_query};
pub use registry::VersionRegistry;

// Re-export types used in our public API
pub use kbox_types::{KboxError, Tool, ToolSpec};
