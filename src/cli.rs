use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// kbox - run infrastructure CLIs in disposable containers with managed versions
#[derive(Parser, Debug)]
#[command(name = "kbox")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run every tool with the host binary instead of a container
    #[arg(long, global = true)]
    pub native: bool,

    /// Config file (default: $KBOX_CONFIG, then ~/.config/kbox/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run kubectl
    #[command(disable_help_flag = true)]
    Kubectl(ToolArgs),
    /// Run helm
    #[command(disable_help_flag = true)]
    Helm(ToolArgs),
    /// Run vault
    #[command(disable_help_flag = true)]
    Vault(ToolArgs),
    /// Run stim
    #[command(disable_help_flag = true)]
    Stim(ToolArgs),
    /// Run kops
    #[command(disable_help_flag = true)]
    Kops(ToolArgs),
    /// Run terraform
    #[command(disable_help_flag = true)]
    Terraform(ToolArgs),

    /// Validate and select a tool version; prints an export line for `eval`
    Kvm {
        /// Tool name
        tool: String,
        /// Version to select, or `auto` to match the server
        version: String,
    },

    /// Show the selected tool versions
    Kversion {
        /// Only this tool
        tool: Option<String>,
        /// Print `export <TOOL>_VERSION=...` lines
        #[arg(long)]
        export: bool,
    },

    /// List kubeconfig contexts, or switch to one
    Kctx {
        context: Option<String>,
    },

    /// List namespaces of the current context, or switch to one
    Kns {
        namespace: Option<String>,
    },
}

/// Arguments passed through to a wrapped tool
///
/// Everything after the tool name belongs to the tool, including `--help`.
#[derive(Args, Debug)]
pub struct ToolArgs {
    /// `[--docker-args "<runtime args>"] <tool args>...`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}
