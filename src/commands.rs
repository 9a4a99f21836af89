use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::debug;

use kbox_config::{CliOverrides, Settings};
use kbox_invoke::{HostEnv, Invoker, ProcessRunner, SystemRunner, parse_tool_args};
use kbox_k8s::KubeContexts;
use kbox_types::{InvocationMode, Tool, ToolSpec};
use kbox_versions::VersionRegistry;

use crate::cli::{Cli, Command};

/// Everything a command needs, built once per process
pub struct Session<R> {
    pub invoker: Invoker<R>,
    pub registry: VersionRegistry,
}

impl Session<SystemRunner> {
    pub fn load(cli: &Cli) -> Result<Self> {
        let host = HostEnv::capture()?;
        let overrides = CliOverrides { native: cli.native };
        let settings = Settings::load(&host, cli.config.as_deref(), &overrides)
            .context("Failed to load configuration")?;
        debug!(runtime = %settings.runtime, "configuration loaded");

        Ok(Self {
            registry: VersionRegistry::new(settings.tools.into_values()),
            invoker: Invoker::new(SystemRunner, settings.runtime, host),
        })
    }
}

/// Run one parsed command line and return the process exit code
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let mut session = Session::load(&cli)?;
    dispatch(&mut session, cli.command).await
}

pub async fn dispatch<R: ProcessRunner>(
    session: &mut Session<R>,
    command: Command,
) -> Result<ExitCode> {
    match command {
        Command::Kubectl(a) => return run_tool(session, Tool::Kubectl, a.args).await,
        Command::Helm(a) => return run_tool(session, Tool::Helm, a.args).await,
        Command::Vault(a) => return run_tool(session, Tool::Vault, a.args).await,
        Command::Stim(a) => return run_tool(session, Tool::Stim, a.args).await,
        Command::Kops(a) => return run_tool(session, Tool::Kops, a.args).await,
        Command::Terraform(a) => return run_tool(session, Tool::Terraform, a.args).await,
        Command::Kvm { tool, version } => {
            let tool: Tool = tool.parse()?;
            let committed = session
                .registry
                .set(&session.invoker, tool, &version)
                .await?;
            eprintln!("{} set to {}", tool, committed);
            println!("{}", export_line(tool, &committed)?);
        }
        Command::Kversion { tool, export } => {
            let specs: Vec<&ToolSpec> = match tool {
                Some(name) => vec![session.registry.spec_by_name(&name)?],
                None => session.registry.versions().collect(),
            };
            for spec in specs {
                if export {
                    println!("{}", export_line(spec.tool, &spec.version)?);
                } else {
                    println!("{}", version_line(spec));
                }
            }
        }
        Command::Kctx { context } => {
            let contexts = KubeContexts::load()?;
            match context {
                Some(name) => {
                    let kubectl = session.registry.spec(Tool::Kubectl);
                    kbox_k8s::switch_context(&session.invoker, kubectl, &contexts, &name).await?;
                }
                None => {
                    for ctx in contexts.contexts() {
                        println!("{} {}", marker(ctx.is_current), ctx.name);
                    }
                }
            }
        }
        Command::Kns { namespace } => match namespace {
            Some(name) => {
                let kubectl = session.registry.spec(Tool::Kubectl);
                kbox_k8s::switch_namespace(&session.invoker, kubectl, &name).await?;
            }
            None => {
                let contexts = KubeContexts::load()?;
                for ns in contexts.list_namespaces().await? {
                    println!("{} {}", marker(ns.is_current), ns.name);
                }
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_tool<R: ProcessRunner>(
    session: &Session<R>,
    tool: Tool,
    args: Vec<String>,
) -> Result<ExitCode> {
    let request = parse_tool_args(tool, args)?;
    let result = session
        .invoker
        .invoke(session.registry.spec(tool), &request)
        .await?;
    Ok(exit_code(result.exit_code))
}

/// Map a child's exit status onto the process exit code
pub fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

/// A line meant for `eval`; the value is shell-quoted when it needs to be
fn export_line(tool: Tool, version: &str) -> Result<String> {
    let value = shlex::try_quote(version)
        .map_err(|e| anyhow::anyhow!("Cannot export {} version: {}", tool, e))?;
    Ok(format!("export {}={}", tool.version_var(), value))
}

fn version_line(spec: &ToolSpec) -> String {
    let mode = match spec.mode {
        InvocationMode::Container => spec.image_ref(),
        InvocationMode::Native => "native".to_string(),
    };
    format!("{:<10} {:<10} {}", spec.tool, spec.version, mode)
}

fn marker(current: bool) -> char {
    if current { '*' } else { ' ' }
}
