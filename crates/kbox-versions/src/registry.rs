use std::collections::BTreeMap;
use std::sync::LazyLock;

use kbox_config::default_spec;
use kbox_invoke::{Invoker, ProcessRunner};
use kbox_types::{InvocationResult, KboxError, Tool, ToolSpec, normalize_version};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::query::{own_version_probe, server_version_query};

const AUTO: &str = "auto";

/// Characters allowed in a version; it becomes an image tag and an exported shell value
static VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.+-]*$").unwrap());

/// Selected version of every tool
///
/// A change is probed before it is committed; a failed probe restores the
/// previous version. `set` takes `&mut self`, so sharing a registry across
/// threads needs an outer lock.
#[derive(Clone, Debug)]
pub struct VersionRegistry {
    specs: BTreeMap<Tool, ToolSpec>,
}

impl VersionRegistry {
    /// Build from initial specs; tools not listed start from their defaults
    pub fn new(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        let mut map: BTreeMap<Tool, ToolSpec> =
            Tool::ALL.iter().map(|&t| (t, default_spec(t))).collect();
        for spec in specs {
            map.insert(spec.tool, spec);
        }
        Self { specs: map }
    }

    /// Committed version of a tool
    pub fn get(&self, tool: Tool) -> &str {
        &self.spec(tool).version
    }

    /// Committed spec looked up by tool name
    pub fn spec_by_name(&self, name: &str) -> Result<&ToolSpec, KboxError> {
        let tool: Tool = name.parse()?;
        Ok(self.spec(tool))
    }

    pub fn spec(&self, tool: Tool) -> &ToolSpec {
        // `new` populates every tool
        &self.specs[&tool]
    }

    /// Committed specs in `Tool::ALL` order
    pub fn versions(&self) -> impl Iterator<Item = &ToolSpec> {
        self.specs.values()
    }

    fn spec_mut(&mut self, tool: Tool) -> &mut ToolSpec {
        self.specs
            .entry(tool)
            .or_insert_with(|| default_spec(tool))
    }

    /// Ask a live server or cluster which version it runs
    pub async fn resolve_auto<R: ProcessRunner>(
        &self,
        invoker: &Invoker<R>,
        tool: Tool,
    ) -> Result<String, KboxError> {
        let query = server_version_query(tool).ok_or(KboxError::AutoUnsupported(tool))?;

        let result = invoker
            .capture(self.spec(tool), query.args)
            .await
            .map_err(|e| KboxError::ResolutionFailed {
                tool,
                reason: e.to_string(),
            })?;
        if !result.success() {
            return Err(KboxError::ResolutionFailed {
                tool,
                reason: describe_failure(&result),
            });
        }

        let version = query.parse(&result.stdout).ok_or_else(|| KboxError::ResolutionFailed {
            tool,
            reason: "server version not found in output".to_string(),
        })?;
        debug!(%tool, %version, "resolved server version");
        Ok(version)
    }

    /// Validate and commit a new version; `auto` resolves it from the server first
    ///
    /// Returns the committed version. On any failure the previous version
    /// stays in place.
    pub async fn set<R: ProcessRunner>(
        &mut self,
        invoker: &Invoker<R>,
        tool: Tool,
        version: &str,
    ) -> Result<String, KboxError> {
        let requested = if version.trim().eq_ignore_ascii_case(AUTO) {
            self.resolve_auto(invoker, tool).await?
        } else {
            version.to_string()
        };

        let candidate = normalize_version(&requested);
        if candidate.is_empty() {
            return Err(KboxError::ValidationFailed {
                tool,
                version: requested,
                reason: "empty version".to_string(),
            });
        }
        if !VERSION_TAG.is_match(&candidate) {
            return Err(KboxError::ValidationFailed {
                tool,
                version: candidate,
                reason: "only letters, digits and `_.+-` are allowed".to_string(),
            });
        }

        let previous = self.get(tool).to_string();
        if candidate == previous {
            debug!(%tool, version = %candidate, "version unchanged");
            return Ok(candidate);
        }

        // Probing: the candidate is visible only to the probe below
        self.spec_mut(tool).version = candidate.clone();
        match self.probe(invoker, tool).await {
            Ok(reported) => {
                if reported != candidate {
                    warn!(%tool, requested = %candidate, %reported, "tool reports a different version");
                }
                info!(%tool, from = %previous, to = %candidate, "version changed");
                Ok(candidate)
            }
            Err(reason) => {
                self.spec_mut(tool).version = previous;
                warn!(%tool, version = %candidate, %reason, "validation failed, version restored");
                Err(KboxError::ValidationFailed {
                    tool,
                    version: candidate,
                    reason,
                })
            }
        }
    }

    /// Run the tool's own version subcommand with the current spec
    async fn probe<R: ProcessRunner>(
        &self,
        invoker: &Invoker<R>,
        tool: Tool,
    ) -> Result<String, String> {
        let probe = own_version_probe(tool);
        let result = invoker
            .capture(self.spec(tool), probe.args)
            .await
            .map_err(|e| e.to_string())?;
        if !result.success() {
            return Err(describe_failure(&result));
        }
        probe
            .parse(&result.stdout)
            .ok_or_else(|| "no version in probe output".to_string())
    }
}

fn describe_failure(result: &InvocationResult) -> String {
    match result.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => format!("exited with status {}: {}", result.exit_code, line),
        None => format!("exited with status {}", result.exit_code),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kbox_invoke::testing::ScriptedRunner;
    use kbox_invoke::{HostEnv, OutputMode};

    use super::*;

    struct Fixture {
        _home: tempfile::TempDir,
        invoker: Invoker<ScriptedRunner>,
    }

    fn fixture(runner: ScriptedRunner) -> Fixture {
        let home = tempfile::tempdir().unwrap();
        let host = HostEnv::new(BTreeMap::new(), home.path(), home.path(), "linux");
        Fixture {
            invoker: Invoker::new(runner, "docker", host),
            _home: home,
        }
    }

    fn registry() -> VersionRegistry {
        VersionRegistry::new([ToolSpec::new(Tool::Kubectl, "example/kubectl", "1.15.12")])
    }

    /// What each tool prints for its own version subcommand
    fn probe_output(tool: Tool, version: &str) -> String {
        match tool {
            Tool::Kubectl => format!("Client Version: v{}\n", version),
            Tool::Helm => format!("v{}", version),
            Tool::Vault => format!("Vault v{} ('abcdef')\n", version),
            Tool::Stim => format!("Stim version: v{}\n", version),
            Tool::Kops => format!("Version {} (git-1234567)\n", version),
            Tool::Terraform => format!("Terraform v{}\n", version),
        }
    }

    #[test]
    fn test_new_fills_defaults() {
        let reg = registry();
        assert_eq!(reg.get(Tool::Kubectl), "1.15.12");
        assert_eq!(reg.spec(Tool::Kubectl).image, "example/kubectl");
        assert_eq!(reg.get(Tool::Helm), default_spec(Tool::Helm).version);
        assert_eq!(reg.versions().count(), Tool::ALL.len());
    }

    #[test]
    fn test_spec_by_name() {
        let reg = registry();
        assert_eq!(reg.spec_by_name("kubectl").unwrap().version, "1.15.12");
        assert_eq!(reg.spec_by_name("Helm").unwrap().tool, Tool::Helm);
        assert!(matches!(
            reg.spec_by_name("kubeadm"),
            Err(KboxError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_versions_follow_tool_list() {
        let reg = registry();
        let tools: Vec<Tool> = reg.versions().map(|s| s.tool).collect();
        assert_eq!(tools, Tool::ALL);
    }

    #[tokio::test]
    async fn test_unsafe_version_rejected() {
        let fx = fixture(ScriptedRunner::new());
        let mut reg = registry();

        for version in ["1.2.3;rm -rf ~", "1.2.3$(id)", "1.2.3`id`", "-1.0", "1.0/../x"] {
            let err = reg.set(&fx.invoker, Tool::Kubectl, version).await.unwrap_err();
            assert!(matches!(err, KboxError::ValidationFailed { .. }), "{version}");
        }
        assert!(fx.invoker.runner().calls().is_empty());
        assert_eq!(reg.get(Tool::Kubectl), "1.15.12");
    }

    #[tokio::test]
    async fn test_unsafe_server_version_rejected() {
        // The host binary would report a clean version; the server string must never commit
        let runner = ScriptedRunner::new()
            .then_stdout(r#"{"version": "1.4.2;touch${IFS}/tmp/x"}"#)
            .then_stdout("Vault v1.4.2 ('abc')\n");
        let fx = fixture(runner);
        let mut reg = VersionRegistry::new([ToolSpec::new(Tool::Vault, "vault", "1.5.4")
            .with_mode(kbox_types::InvocationMode::Native)]);

        let err = reg.set(&fx.invoker, Tool::Vault, "auto").await.unwrap_err();
        match err {
            KboxError::ValidationFailed { tool, version, .. } => {
                assert_eq!(tool, Tool::Vault);
                assert!(version.contains(';'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(reg.get(Tool::Vault), "1.5.4");
        // Only the server query ran
        assert_eq!(fx.invoker.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_build_metadata_versions_allowed() {
        let fx = fixture(ScriptedRunner::new().then_stdout("Client Version: v1.14.10-eks-bbe9e4\n"));
        let mut reg = registry();
        assert_eq!(
            reg.set(&fx.invoker, Tool::Kubectl, "v1.14.10-eks-bbe9e4").await.unwrap(),
            "1.14.10-eks-bbe9e4"
        );
    }

    #[tokio::test]
    async fn test_set_then_get_for_every_tool() {
        for tool in Tool::ALL {
            let fx = fixture(ScriptedRunner::new().then_stdout(&probe_output(tool, "9.8.7")));
            let mut reg = registry();

            let committed = reg.set(&fx.invoker, tool, "v9.8.7").await.unwrap();
            assert_eq!(committed, "9.8.7", "{tool}");
            assert_eq!(reg.get(tool), "9.8.7", "{tool}");
        }
    }

    #[tokio::test]
    async fn test_kvm_kubectl_commits_after_probe() {
        let fx = fixture(ScriptedRunner::new().then_stdout("Client Version: v1.16.14"));
        let mut reg = registry();

        assert_eq!(reg.set(&fx.invoker, Tool::Kubectl, "1.16.14").await.unwrap(), "1.16.14");
        assert_eq!(reg.get(Tool::Kubectl), "1.16.14");

        let calls = fx.invoker.runner().calls();
        assert_eq!(calls.len(), 1);
        let probe = &calls[0];
        assert_eq!(probe.output, OutputMode::Capture);
        // The probe runs the candidate image, not the committed one
        assert!(probe.command.has_arg("example/kubectl:1.16.14"));
        assert!(probe.command.args.ends_with(&["version".to_string(), "--client".to_string()]));
    }

    #[tokio::test]
    async fn test_failed_probe_rolls_back() {
        let fx = fixture(ScriptedRunner::new().then_stderr(
            125,
            "docker: Error response from daemon: manifest for example/kubectl:9.9.9 not found",
        ));
        let mut reg = registry();

        let err = reg.set(&fx.invoker, Tool::Kubectl, "9.9.9").await.unwrap_err();
        match err {
            KboxError::ValidationFailed { tool, version, reason } => {
                assert_eq!(tool, Tool::Kubectl);
                assert_eq!(version, "9.9.9");
                assert!(reason.contains("status 125"));
                assert!(reason.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(reg.get(Tool::Kubectl), "1.15.12");
        assert_eq!(reg.spec(Tool::Kubectl).image_ref(), "example/kubectl:1.15.12");
    }

    #[tokio::test]
    async fn test_unparseable_probe_rolls_back() {
        let fx = fixture(ScriptedRunner::new().then_stdout("Usage: kubectl [flags]"));
        let mut reg = registry();

        let err = reg.set(&fx.invoker, Tool::Kubectl, "1.17.0").await.unwrap_err();
        assert!(matches!(err, KboxError::ValidationFailed { .. }));
        assert_eq!(reg.get(Tool::Kubectl), "1.15.12");
    }

    #[tokio::test]
    async fn test_spawn_error_rolls_back() {
        let fx = fixture(ScriptedRunner::new().then_spawn_error());
        let mut reg = registry();

        let err = reg.set(&fx.invoker, Tool::Helm, "2.17.0").await.unwrap_err();
        assert!(matches!(err, KboxError::ValidationFailed { tool: Tool::Helm, .. }));
        assert_eq!(reg.get(Tool::Helm), default_spec(Tool::Helm).version);
    }

    #[tokio::test]
    async fn test_same_version_is_a_noop() {
        let fx = fixture(ScriptedRunner::new().then_stdout("Client Version: v1.16.14"));
        let mut reg = registry();

        reg.set(&fx.invoker, Tool::Kubectl, "v1.16.14").await.unwrap();
        assert_eq!(reg.set(&fx.invoker, Tool::Kubectl, "1.16.14").await.unwrap(), "1.16.14");
        assert_eq!(reg.set(&fx.invoker, Tool::Kubectl, "v1.16.14").await.unwrap(), "1.16.14");

        // Only the first change ran a probe
        assert_eq!(fx.invoker.runner().calls().len(), 1);
        assert_eq!(reg.get(Tool::Kubectl), "1.16.14");
    }

    #[tokio::test]
    async fn test_auto_unsupported() {
        let fx = fixture(ScriptedRunner::new());
        let mut reg = registry();

        for tool in [Tool::Terraform, Tool::Stim, Tool::Kops] {
            let before = reg.get(tool).to_string();
            let err = reg.set(&fx.invoker, tool, "auto").await.unwrap_err();
            assert!(matches!(err, KboxError::AutoUnsupported(t) if t == tool));
            assert_eq!(reg.get(tool), before);
        }
        assert!(fx.invoker.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_resolves_from_cluster() {
        let runner = ScriptedRunner::new()
            .then_stdout("Client Version: v1.15.12\nServer Version: v1.16.14\n")
            .then_stdout("Client Version: v1.16.14\n");
        let fx = fixture(runner);
        let mut reg = registry();

        assert_eq!(reg.set(&fx.invoker, Tool::Kubectl, "auto").await.unwrap(), "1.16.14");
        assert_eq!(reg.get(Tool::Kubectl), "1.16.14");

        let calls = fx.invoker.runner().calls();
        assert_eq!(calls.len(), 2);
        // The server query runs with the committed client
        assert!(calls[0].command.has_arg("example/kubectl:1.15.12"));
        assert_eq!(calls[0].command.args.last().map(String::as_str), Some("version"));
        assert!(calls[1].command.has_arg("example/kubectl:1.16.14"));
    }

    #[tokio::test]
    async fn test_auto_resolves_vault_from_status() {
        let runner = ScriptedRunner::new()
            .then_stdout(r#"{"sealed": false, "version": "1.4.2"}"#)
            .then_stdout("Vault v1.4.2 ('abc')\n");
        let fx = fixture(runner);
        let mut reg = registry();

        assert_eq!(reg.set(&fx.invoker, Tool::Vault, "AUTO").await.unwrap(), "1.4.2");
        let calls = fx.invoker.runner().calls();
        assert!(calls[0].command.has_arg("-format=json"));
    }

    #[tokio::test]
    async fn test_auto_resolution_failures() {
        let fx = fixture(ScriptedRunner::new().then_stderr(
            1,
            "The connection to the server localhost:8080 was refused",
        ));
        let mut reg = registry();
        let err = reg.set(&fx.invoker, Tool::Kubectl, "auto").await.unwrap_err();
        assert!(matches!(err, KboxError::ResolutionFailed { ref reason, .. } if reason.contains("refused")));
        assert_eq!(reg.get(Tool::Kubectl), "1.15.12");

        let fx = fixture(ScriptedRunner::new().then_stdout("<no value>"));
        let err = reg.set(&fx.invoker, Tool::Helm, "auto").await.unwrap_err();
        assert!(matches!(err, KboxError::ResolutionFailed { tool: Tool::Helm, .. }));
        assert_eq!(fx.invoker.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_version_rejected() {
        let fx = fixture(ScriptedRunner::new());
        let mut reg = registry();
        let err = reg.set(&fx.invoker, Tool::Helm, " v ").await.unwrap_err();
        assert!(matches!(err, KboxError::ValidationFailed { .. }));
        assert!(fx.invoker.runner().calls().is_empty());
    }
}
