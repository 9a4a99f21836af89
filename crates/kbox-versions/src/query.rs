use kbox_types::Tool;

use crate::extract;

/// A version-reporting command and the rule that parses its output
#[derive(Clone, Copy, Debug)]
pub struct VersionQuery {
    pub args: &'static [&'static str],
    pub extract: fn(&str) -> Option<String>,
}

impl VersionQuery {
    pub fn parse(&self, output: &str) -> Option<String> {
        (self.extract)(output)
    }
}

/// The tool's own version subcommand, used to validate a candidate version
pub fn own_version_probe(tool: Tool) -> VersionQuery {
    match tool {
        Tool::Kubectl => VersionQuery {
            args: &["version", "--client"],
            extract: extract::kubectl_client_version,
        },
        Tool::Helm => VersionQuery {
            args: &["version", "--client", "--template", "{{ .Client.SemVer }}"],
            extract: extract::helm_semver,
        },
        Tool::Vault => VersionQuery {
            args: &["version"],
            extract: extract::vault_client_version,
        },
        Tool::Stim => VersionQuery {
            args: &["version"],
            extract: extract::stim_version,
        },
        Tool::Kops => VersionQuery {
            args: &["version"],
            extract: extract::kops_version,
        },
        Tool::Terraform => VersionQuery {
            args: &["version"],
            extract: extract::terraform_version,
        },
    }
}

/// The query that reports the server or cluster side version, if the tool has one
pub fn server_version_query(tool: Tool) -> Option<VersionQuery> {
    match tool {
        Tool::Kubectl => Some(VersionQuery {
            args: &["version"],
            extract: extract::kubectl_server_version,
        }),
        Tool::Helm => Some(VersionQuery {
            args: &["version", "--server", "--template", "{{ .Server.SemVer }}"],
            extract: extract::helm_semver,
        }),
        Tool::Vault => Some(VersionQuery {
            args: &["status", "-format=json"],
            extract: extract::vault_server_version,
        }),
        Tool::Stim | Tool::Kops | Tool::Terraform => None,
    }
}
