//! Version-string extraction from each tool's text output
//!
//! Every function takes the complete stdout of one command and returns the
//! version without a leading `v`, or `None` when the output has no
//! recognizable version.

use std::sync::LazyLock;

use regex::Regex;

/// Legacy kubectl output: `version.Info{Major:"1", ..., GitVersion:"v1.13.2", ...}`
static GIT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"GitVersion:"v?([^"]+)""#).unwrap());

/// First whitespace-separated token with one leading `v` removed; must start with a digit
fn version_token(s: &str) -> Option<String> {
    let token = s.split_whitespace().next()?;
    let token = token.strip_prefix('v').unwrap_or(token);
    token
        .starts_with(|c: char| c.is_ascii_digit())
        .then(|| token.to_string())
}

/// Text after `marker` on the first line containing it
fn after_marker<'a>(output: &'a str, marker: &str) -> Option<&'a str> {
    output
        .lines()
        .find_map(|line| line.split_once(marker).map(|(_, rest)| rest))
}

fn kubectl_marked(output: &str, marker: &str) -> Option<String> {
    let rest = after_marker(output, marker)?.trim();
    if let Some(caps) = GIT_VERSION.captures(rest) {
        return version_token(&caps[1]);
    }
    version_token(rest)
}

/// `kubectl version --client`: `Client Version: v1.13.2` → `1.13.2`
pub fn kubectl_client_version(output: &str) -> Option<String> {
    kubectl_marked(output, "Client Version:")
}

/// `kubectl version`: `Server Version: v1.14.10-eks-1` → `1.14.10-eks-1`
pub fn kubectl_server_version(output: &str) -> Option<String> {
    kubectl_marked(output, "Server Version:")
}

/// `helm version --template '{{ .Client.SemVer }}'` (or `.Server.SemVer`): `v2.14.3` → `2.14.3`
pub fn helm_semver(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    version_token(line)
}

/// `vault version`: `Vault v1.2.3 ('c14bd9a2')` → `1.2.3`
pub fn vault_client_version(output: &str) -> Option<String> {
    version_token(after_marker(output, "Vault v")?)
}

/// `vault status -format=json`: the `version` field
pub fn vault_server_version(output: &str) -> Option<String> {
    let status: serde_json::Value = serde_json::from_str(output.trim()).ok()?;
    version_token(status.get("version")?.as_str()?)
}

/// `kops version`: `Version 1.15.0 (git-9992b4055)` → `1.15.0`
pub fn kops_version(output: &str) -> Option<String> {
    output.lines().map(str::trim).find_map(|line| {
        line.strip_prefix("Version ")
            .or_else(|| line.strip_prefix("Client version: "))
            .and_then(version_token)
    })
}

/// `terraform version`: `Terraform v0.12.24` → `0.12.24`
pub fn terraform_version(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("Terraform ").and_then(version_token))
}

/// `stim version`: `Stim version: v0.1.4` → `0.1.4`
pub fn stim_version(output: &str) -> Option<String> {
    const LABEL: &str = "version:";
    output.lines().find_map(|line| {
        // ASCII lowercasing keeps byte offsets valid for the original line
        let idx = line.to_ascii_lowercase().find(LABEL)?;
        version_token(&line[idx + LABEL.len()..])
    })
}
