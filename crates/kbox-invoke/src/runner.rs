use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};

use kbox_types::InvocationResult;

/// A fully built command: program, arguments and extra environment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Whether `flag` appears among the arguments
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Shell-quoted rendering for logs (environment values are not shown)
    pub fn display(&self) -> String {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| format!("{} {}", self.program, self.args.join(" ")))
    }
}

/// What happens to the child's standard streams
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Streams are shared with the caller's terminal
    Inherit,
    /// stdin is closed and stdout/stderr are collected
    Capture,
}

/// Runs a command line to completion
pub trait ProcessRunner {
    fn run(
        &self,
        command: &CommandLine,
        output: OutputMode,
    ) -> impl Future<Output = io::Result<InvocationResult>>;
}

/// Runs commands as real child processes
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandLine, output: OutputMode) -> io::Result<InvocationResult> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        match output {
            OutputMode::Inherit => {
                let status = cmd.status().await?;
                Ok(InvocationResult::exited(exit_code(status)))
            }
            OutputMode::Capture => {
                let out = cmd.stdin(Stdio::null()).output().await?;
                Ok(InvocationResult {
                    exit_code: exit_code(out.status),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                })
            }
        }
    }
}

/// Exit code of a finished child; signals map to `128 + signal` like a shell
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
