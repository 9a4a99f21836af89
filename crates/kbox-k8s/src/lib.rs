//! Kubernetes helpers for kbox
//!
//! Contexts and the current namespace are read from the kubeconfig; changes
//! go through the wrapped kubectl so they behave exactly like the CLI.

mod client;
mod switch;

pub use client::{DEFAULT_NAMESPACE, KubeContexts};
pub use switch::{switch_context, switch_namespace};

// Re-export types that are used in our public API
pub use kbox_types::{ContextInfo, NamespaceInfo};
