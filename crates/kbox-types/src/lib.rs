//! Shared types for kbox
//!
//! This crate contains data structures used across multiple kbox crates.

mod error;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub use error::KboxError;

// ============================================================================
// Tools
// ============================================================================

/// One of the wrapped command-line tools
///
/// Variant order is the listing order and matches `Tool::ALL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tool {
    /// Workload client
    Kubectl,
    /// Package installer
    Helm,
    /// Secrets client
    Vault,
    /// Deploy/secrets helper
    Stim,
    /// Cluster-management client
    Kops,
    /// Infra-as-code tool
    Terraform,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Kubectl,
        Tool::Helm,
        Tool::Vault,
        Tool::Stim,
        Tool::Kops,
        Tool::Terraform,
    ];

    /// Name used on the command line and as the container entrypoint
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kops => "kops",
            Self::Kubectl => "kubectl",
            Self::Helm => "helm",
            Self::Vault => "vault",
            Self::Stim => "stim",
            Self::Terraform => "terraform",
        }
    }

    /// Prefix of the `<TOOL>_IMAGE` / `<TOOL>_VERSION` / `<TOOL>_MODE` variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Kops => "KOPS",
            Self::Kubectl => "KUBECTL",
            Self::Helm => "HELM",
            Self::Vault => "VAULT",
            Self::Stim => "STIM",
            Self::Terraform => "TERRAFORM",
        }
    }

    pub fn version_var(&self) -> String {
        format!("{}_VERSION", self.env_prefix())
    }

    pub fn image_var(&self) -> String {
        format!("{}_IMAGE", self.env_prefix())
    }

    pub fn mode_var(&self) -> String {
        format!("{}_MODE", self.env_prefix())
    }

    /// Whether the tool can report a version from a live server or cluster
    pub fn supports_auto(&self) -> bool {
        matches!(self, Self::Kubectl | Self::Helm | Self::Vault)
    }

    /// Comma-separated list of every tool name, for usage messages
    pub fn known_names() -> String {
        Self::ALL
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = KboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kops" => Ok(Self::Kops),
            "kubectl" => Ok(Self::Kubectl),
            "helm" => Ok(Self::Helm),
            "vault" => Ok(Self::Vault),
            "stim" => Ok(Self::Stim),
            "terraform" => Ok(Self::Terraform),
            _ => Err(KboxError::UnknownTool(s.to_string())),
        }
    }
}

/// How a tool is executed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Inside an ephemeral container
    #[default]
    Container,
    /// The binary installed on the host
    Native,
}

impl FromStr for InvocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "container" | "docker" => Ok(Self::Container),
            "native" | "host" => Ok(Self::Native),
            other => Err(format!(
                "'{}' is not a mode (expected 'container' or 'native')",
                other
            )),
        }
    }
}

/// Strip surrounding whitespace and one leading `v` from a version string
pub fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    trimmed.strip_prefix('v').unwrap_or(trimmed).to_string()
}

/// Selected image, version and mode for one tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub tool: Tool,
    pub image: String,
    pub version: String,
    pub mode: InvocationMode,
}

impl ToolSpec {
    pub fn new(tool: Tool, image: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            tool,
            image: image.into(),
            version: normalize_version(&version.into()),
            mode: InvocationMode::Container,
        }
    }

    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Container image reference (`image:version`)
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }
}

// ============================================================================
// Invocation Types
// ============================================================================

/// A single call to a wrapped tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRequest {
    pub tool: Tool,

    /// Arguments passed through to the tool unmodified
    pub args: Vec<String>,

    /// Extra container-runtime arguments (from `--docker-args`)
    pub docker_args: Vec<String>,

    /// Extra environment bindings for the child
    pub env: Vec<(String, String)>,
}

impl InvocationRequest {
    pub fn new<I, S>(tool: Tool, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
            docker_args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_docker_args(mut self, docker_args: Vec<String>) -> Self {
        self.docker_args = docker_args;
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }
}

/// Outcome of a child process
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationResult {
    pub exit_code: i32,

    /// Captured standard output (empty when passed through)
    pub stdout: String,

    /// Captured standard error (empty when passed through)
    pub stderr: String,
}

impl InvocationResult {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `InvocationFailed`
    pub fn into_success(self, tool: Tool) -> Result<Self, KboxError> {
        if self.success() {
            Ok(self)
        } else {
            Err(KboxError::InvocationFailed {
                tool,
                code: self.exit_code,
            })
        }
    }
}

// ============================================================================
// Host Environment
// ============================================================================

/// Snapshot of the caller's environment, taken once at startup
#[derive(Clone, Debug)]
pub struct HostEnv {
    vars: BTreeMap<String, String>,
    home: PathBuf,
    cwd: PathBuf,
    os: String,
}

impl HostEnv {
    pub fn new(
        vars: BTreeMap<String, String>,
        home: impl Into<PathBuf>,
        cwd: impl Into<PathBuf>,
        os: impl Into<String>,
    ) -> Self {
        Self {
            vars,
            home: home.into(),
            cwd: cwd.into(),
            os: os.into(),
        }
    }

    /// Capture the current process environment
    pub fn capture() -> Result<Self, KboxError> {
        let home = dirs::home_dir().ok_or(KboxError::HomeDirNotFound)?;
        let cwd = std::env::current_dir()?;
        Ok(Self::new(
            unicode_vars(std::env::vars_os()),
            home,
            cwd,
            std::env::consts::OS,
        ))
    }

    /// Value of a variable, treating empty values as unset
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.var(name).is_some()
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn os(&self) -> &str {
        &self.os
    }
}

/// Keep the variables whose name and value are valid Unicode
fn unicode_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> BTreeMap<String, String> {
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (name, _) => {
                let name = name.unwrap_or_else(|n| n.to_string_lossy().into_owned());
                debug!(%name, "skipping environment variable that is not valid Unicode");
                None
            }
        })
        .collect()
}

// ============================================================================
// Kubernetes Types
// ============================================================================

/// Kubernetes context information
#[derive(Clone, Debug)]
pub struct ContextInfo {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
    pub is_current: bool,
}

impl ContextInfo {
    pub fn new(
        name: String,
        cluster: String,
        user: String,
        namespace: Option<String>,
        is_current: bool,
    ) -> Self {
        Self {
            name,
            cluster,
            user,
            namespace,
            is_current,
        }
    }
}

/// Namespace information
#[derive(Clone, Debug)]
pub struct NamespaceInfo {
    pub name: String,
    pub status: String,
    pub is_current: bool,
}

impl NamespaceInfo {
    pub fn new(name: String, status: String) -> Self {
        Self {
            name,
            status,
            is_current: false,
        }
    }
}
