use std::collections::BTreeSet;
use std::fs;

use kbox_types::{
    HostEnv, InvocationMode, InvocationRequest, InvocationResult, KboxError, ToolSpec,
};
use tracing::{debug, warn};

use crate::profile::{CONTAINER_HOME, MountKind, ToolProfile, profile};
use crate::runner::{CommandLine, OutputMode, ProcessRunner};

/// Platforms where containerized networking cannot publish ports to the host
const NO_HOST_NETWORK_OS: &[&str] = &["macos", "windows"];

/// Subcommands that never need credentials
const CREDENTIAL_FREE: &[&str] = &["version", "help", "completion", "--help", "-h"];

const AWS_HINT: &str = "Run `aws configure` (or `stim aws login` for federated accounts) and retry.";

/// Runs wrapped tools natively or inside ephemeral containers
pub struct Invoker<R> {
    runner: R,
    runtime: String,
    host: HostEnv,
}

impl<R: ProcessRunner> Invoker<R> {
    pub fn new(runner: R, runtime: impl Into<String>, host: HostEnv) -> Self {
        Self {
            runner,
            runtime: runtime.into(),
            host,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn host(&self) -> &HostEnv {
        &self.host
    }

    /// Run a tool with the caller's terminal attached; the exit code is returned as-is
    pub async fn invoke(
        &self,
        spec: &ToolSpec,
        request: &InvocationRequest,
    ) -> Result<InvocationResult, KboxError> {
        self.invoke_with(profile(spec.tool), spec, request).await
    }

    async fn invoke_with(
        &self,
        profile: &ToolProfile,
        spec: &ToolSpec,
        request: &InvocationRequest,
    ) -> Result<InvocationResult, KboxError> {
        self.check_credentials(profile, request)?;

        if spec.mode == InvocationMode::Native {
            if !request.docker_args.is_empty() {
                warn!(tool = %spec.tool, "--docker-args ignored in native mode");
            }
            let command = self.command_for(spec, request, false);
            return self.run(&command, OutputMode::Inherit).await;
        }

        self.prepare_mounts(profile);

        let mut interactive = false;
        if let Some(table) = profile.interactive {
            if table.needs_host_network(&request.args)
                && NO_HOST_NETWORK_OS.contains(&self.host.os())
            {
                warn!(
                    tool = %spec.tool,
                    os = self.host.os(),
                    "containers cannot expose ports to the host on this platform; \
                     install {} natively or rerun with --native",
                    spec.tool
                );
            }
            interactive = table.needs_tty(&request.args) && request.docker_args.is_empty();
        }

        let command = self.command_for(spec, request, interactive);
        let result = self.run(&command, OutputMode::Inherit).await?;

        if !result.success() && profile.retry_interactive && !interactive {
            warn!(
                tool = %spec.tool,
                code = result.exit_code,
                "non-interactive call failed, retrying with a terminal attached"
            );
            let command = self.command_for(spec, request, true);
            return self.run(&command, OutputMode::Inherit).await;
        }

        Ok(result)
    }

    /// Run a tool with output captured, for version probes and queries
    pub async fn capture(
        &self,
        spec: &ToolSpec,
        args: &[&str],
    ) -> Result<InvocationResult, KboxError> {
        let request = InvocationRequest::new(spec.tool, args.iter().copied());
        if spec.mode == InvocationMode::Container {
            self.prepare_mounts(profile(spec.tool));
        }
        let command = self.command_for(spec, &request, false);
        self.run(&command, OutputMode::Capture).await
    }

    /// Build the command line without running it
    pub fn command_for(
        &self,
        spec: &ToolSpec,
        request: &InvocationRequest,
        interactive: bool,
    ) -> CommandLine {
        match spec.mode {
            InvocationMode::Native => self.native_command(spec, request),
            InvocationMode::Container => self.container_command(spec, request, interactive),
        }
    }

    fn native_command(&self, spec: &ToolSpec, request: &InvocationRequest) -> CommandLine {
        let mut command = CommandLine::new(spec.tool.name());
        command.args(request.args.iter().cloned());
        for (name, value) in &request.env {
            command.env(name.clone(), value.clone());
        }
        command
    }

    fn container_command(
        &self,
        spec: &ToolSpec,
        request: &InvocationRequest,
        interactive: bool,
    ) -> CommandLine {
        let profile = profile(spec.tool);
        let mut command = CommandLine::new(&self.runtime);
        command.args(["run", "--rm"]);
        if interactive {
            command.args(["-i", "-t"]);
        }
        command.args(["--network", "host"]);

        for mount in profile.mounts {
            let source = self.host.home().join(mount.source);
            if mount.kind == MountKind::File && !source.is_file() {
                continue;
            }
            command.arg("-v").arg(format!(
                "{}:{}/{}",
                source.display(),
                CONTAINER_HOME,
                mount.target
            ));
        }

        let cwd = self.host.cwd().display().to_string();
        command.arg("-v").arg(format!("{}:{}", cwd, cwd));

        for name in self.forwarded_vars(profile) {
            if let Some(value) = self.host.var(&name) {
                let value = value.to_string();
                command.arg("-e").arg(name.clone());
                command.env(name, value);
            }
        }
        for (name, value) in &request.env {
            command.arg("-e").arg(format!("{}={}", name, value));
        }

        command.arg("-w").arg(cwd);
        command.args(request.docker_args.iter().cloned());
        command.arg("--entrypoint").arg(spec.tool.name());
        command.arg(spec.image_ref());
        command.args(request.args.iter().cloned());
        command
    }

    /// Fixed names that are set on the host, then prefix matches in name order
    fn forwarded_vars(&self, profile: &ToolProfile) -> Vec<String> {
        let mut names: Vec<String> = profile
            .forwarded_names()
            .into_iter()
            .filter(|name| self.host.is_set(name))
            .map(str::to_string)
            .collect();

        let by_prefix: BTreeSet<&str> = self
            .host
            .vars()
            .map(|(name, _)| name)
            .filter(|name| profile.forward_prefixes.iter().any(|p| name.starts_with(p)))
            .collect();
        for name in by_prefix {
            if !names.iter().any(|n| n == name) && self.host.is_set(name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Create missing directory mounts on the host
    fn prepare_mounts(&self, profile: &ToolProfile) {
        for mount in profile.mounts.iter().filter(|m| m.kind == MountKind::Dir) {
            let path = self.host.home().join(mount.source);
            if let Err(e) = fs::create_dir_all(&path) {
                warn!(path = %path.display(), error = %e, "could not create mount directory");
            }
        }
    }

    fn check_credentials(
        &self,
        profile: &ToolProfile,
        request: &InvocationRequest,
    ) -> Result<(), KboxError> {
        if !profile.requires_aws {
            return Ok(());
        }
        let exempt = match request.args.first() {
            None => true,
            Some(first) => CREDENTIAL_FREE.contains(&first.as_str()),
        };
        if exempt || has_aws_credentials(&self.host) {
            return Ok(());
        }
        Err(KboxError::MissingCredentials {
            tool: request.tool,
            hint: AWS_HINT.to_string(),
        })
    }

    async fn run(
        &self,
        command: &CommandLine,
        output: OutputMode,
    ) -> Result<InvocationResult, KboxError> {
        debug!(command = %command.display(), ?output, "running");
        self.runner
            .run(command, output)
            .await
            .map_err(|source| KboxError::Spawn {
                program: command.program.clone(),
                source,
            })
    }
}

fn has_aws_credentials(host: &HostEnv) -> bool {
    host.is_set("AWS_ACCESS_KEY_ID")
        || host.is_set("AWS_PROFILE")
        || host.home().join(".aws").join("credentials").is_file()
}
