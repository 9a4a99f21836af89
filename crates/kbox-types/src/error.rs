use crate::Tool;

/// Errors produced while selecting versions or invoking tools
#[derive(Debug, thiserror::Error)]
pub enum KboxError {
    #[error("unknown tool '{0}' (expected one of: {known})", known = Tool::known_names())]
    UnknownTool(String),

    #[error("{0} has no server-side version; 'auto' is not supported")]
    AutoUnsupported(Tool),

    #[error("could not resolve the server version for {tool}: {reason}")]
    ResolutionFailed { tool: Tool, reason: String },

    #[error("{tool} {version} failed validation: {reason}")]
    ValidationFailed {
        tool: Tool,
        version: String,
        reason: String,
    },

    #[error("{tool} needs AWS credentials but none were found\n{hint}")]
    MissingCredentials { tool: Tool, hint: String },

    #[error("{tool} exited with status {code}")]
    InvocationFailed { tool: Tool, code: i32 },

    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid --docker-args: {0}")]
    InvalidDockerArgs(String),

    #[error("context '{0}' not found in kubeconfig")]
    ContextNotFound(String),

    #[error("could not determine home directory")]
    HomeDirNotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KboxError {
    /// Process exit code for this error; a failed child keeps its own code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvocationFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
