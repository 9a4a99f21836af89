//! Scripted process runner for tests

use std::collections::VecDeque;
use std::io;

use kbox_types::InvocationResult;
use parking_lot::Mutex;

use crate::runner::{CommandLine, OutputMode, ProcessRunner};

/// A scripted outcome for one call
#[derive(Clone, Debug)]
pub enum Reply {
    Exit(InvocationResult),
    SpawnError,
}

/// A command the runner was asked to execute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: CommandLine,
    pub output: OutputMode,
}

/// Replays scripted replies in order and records every call
///
/// Once the script is exhausted every call exits 0 with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, reply: Reply) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn then_exit(self, code: i32) -> Self {
        self.then(Reply::Exit(InvocationResult::exited(code)))
    }

    /// Exit 0 with the given stdout
    pub fn then_stdout(self, stdout: &str) -> Self {
        self.then(Reply::Exit(InvocationResult {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }))
    }

    /// Exit non-zero with the given stderr
    pub fn then_stderr(self, code: i32, stderr: &str) -> Self {
        self.then(Reply::Exit(InvocationResult {
            exit_code: code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }))
    }

    pub fn then_spawn_error(self) -> Self {
        self.then(Reply::SpawnError)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandLine, output: OutputMode) -> io::Result<InvocationResult> {
        self.calls.lock().push(RecordedCall {
            command: command.clone(),
            output,
        });
        match self.replies.lock().pop_front() {
            Some(Reply::Exit(result)) => Ok(result),
            Some(Reply::SpawnError) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", command.program),
            )),
            None => Ok(InvocationResult::exited(0)),
        }
    }
}
