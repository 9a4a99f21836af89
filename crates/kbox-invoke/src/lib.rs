//! Tool invocation for kbox
//!
//! This crate builds and runs the command line for a wrapped tool, either
//! inside an ephemeral container or with the host binary.

mod invoker;
mod policy;
mod profile;
mod request;
mod runner;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use invoker::Invoker;
pub use policy::{InteractiveTable, KUBECTL_INTERACTIVE};
pub use profile::{Mount, MountKind, ToolProfile, profile};
pub use request::parse_tool_args;
pub use runner::{CommandLine, OutputMode, ProcessRunner, SystemRunner};

// Re-export types used in our public API
pub use kbox_types::{HostEnv, InvocationRequest, InvocationResult, KboxError, Tool, ToolSpec};
