use kbox_types::Tool;

use crate::policy::{InteractiveTable, KUBECTL_INTERACTIVE};

/// Home directory inside every tool container
pub const CONTAINER_HOME: &str = "/root";

const AWS_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_PROFILE",
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
];

const KUBE_VARS: &[&str] = &["KUBECONFIG"];

const HELM_VARS: &[&str] = &["HELM_HOME", "TILLER_NAMESPACE"];

const VAULT_VARS: &[&str] = &[
    "VAULT_ADDR",
    "VAULT_TOKEN",
    "VAULT_NAMESPACE",
    "VAULT_CACERT",
    "VAULT_SKIP_VERIFY",
];

const KOPS_VARS: &[&str] = &["KOPS_STATE_STORE"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountKind {
    /// Created on the host when missing
    Dir,
    /// Mounted only when it already exists
    File,
}

/// A path under the host home directory bind-mounted into the container
#[derive(Clone, Copy, Debug)]
pub struct Mount {
    /// Relative to the host home directory
    pub source: &'static str,
    /// Relative to `CONTAINER_HOME`
    pub target: &'static str,
    pub kind: MountKind,
}

const fn dir(path: &'static str) -> Mount {
    Mount {
        source: path,
        target: path,
        kind: MountKind::Dir,
    }
}

const fn file(path: &'static str) -> Mount {
    Mount {
        source: path,
        target: path,
        kind: MountKind::File,
    }
}

/// Fixed invocation parameters for one tool
#[derive(Debug)]
pub struct ToolProfile {
    pub mounts: &'static [Mount],

    /// Variables forwarded when set on the host
    pub forward_env: &'static [&'static [&'static str]],

    /// Every host variable with one of these prefixes is forwarded
    pub forward_prefixes: &'static [&'static str],

    /// Refuses to run without AWS credentials
    pub requires_aws: bool,

    /// A failed non-interactive call is retried once with a terminal
    pub retry_interactive: bool,

    pub interactive: Option<&'static InteractiveTable>,
}

static KUBECTL: ToolProfile = ToolProfile {
    mounts: &[dir(".kube"), dir(".aws")],
    forward_env: &[KUBE_VARS, AWS_VARS],
    forward_prefixes: &[],
    requires_aws: false,
    retry_interactive: false,
    interactive: Some(&KUBECTL_INTERACTIVE),
};

static HELM: ToolProfile = ToolProfile {
    mounts: &[dir(".kube"), dir(".helm"), dir(".aws")],
    forward_env: &[KUBE_VARS, HELM_VARS, AWS_VARS],
    forward_prefixes: &[],
    requires_aws: false,
    retry_interactive: false,
    interactive: None,
};

static VAULT: ToolProfile = ToolProfile {
    mounts: &[file(".vault-token")],
    forward_env: &[VAULT_VARS],
    forward_prefixes: &[],
    requires_aws: false,
    retry_interactive: true,
    interactive: None,
};

static STIM: ToolProfile = ToolProfile {
    mounts: &[
        dir(".stim"),
        dir(".kube"),
        dir(".helm"),
        dir(".aws"),
        file(".vault-token"),
    ],
    forward_env: &[VAULT_VARS, KUBE_VARS, AWS_VARS],
    forward_prefixes: &[],
    requires_aws: false,
    retry_interactive: true,
    interactive: None,
};

static KOPS: ToolProfile = ToolProfile {
    mounts: &[dir(".kube"), dir(".aws"), dir(".ssh")],
    forward_env: &[KOPS_VARS, KUBE_VARS, AWS_VARS],
    forward_prefixes: &[],
    requires_aws: true,
    retry_interactive: false,
    interactive: None,
};

static TERRAFORM: ToolProfile = ToolProfile {
    mounts: &[dir(".aws"), dir(".ssh"), dir(".terraform.d")],
    forward_env: &[AWS_VARS],
    forward_prefixes: &["TF_"],
    requires_aws: false,
    retry_interactive: false,
    interactive: None,
};

/// Invocation parameters for a tool
pub fn profile(tool: Tool) -> &'static ToolProfile {
    match tool {
        Tool::Kubectl => &KUBECTL,
        Tool::Helm => &HELM,
        Tool::Vault => &VAULT,
        Tool::Stim => &STIM,
        Tool::Kops => &KOPS,
        Tool::Terraform => &TERRAFORM,
    }
}

impl ToolProfile {
    /// Forwarded variable names in declaration order, without duplicates
    pub fn forwarded_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for name in self.forward_env.iter().flat_map(|group| group.iter()) {
            if !names.contains(name) {
                names.push(*name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_kubectl_has_interactive_table() {
        for tool in Tool::ALL {
            assert_eq!(profile(tool).interactive.is_some(), tool == Tool::Kubectl);
        }
    }

    #[test]
    fn test_secrets_clients_retry() {
        assert!(profile(Tool::Vault).retry_interactive);
        assert!(profile(Tool::Stim).retry_interactive);
        assert!(!profile(Tool::Kubectl).retry_interactive);
    }

    #[test]
    fn test_forwarded_names_dedup() {
        let names = profile(Tool::Stim).forwarded_names();
        assert_eq!(names.first(), Some(&"VAULT_ADDR"));
        assert_eq!(names.iter().filter(|n| **n == "KUBECONFIG").count(), 1);
        assert!(names.contains(&"AWS_SESSION_TOKEN"));
    }
}
