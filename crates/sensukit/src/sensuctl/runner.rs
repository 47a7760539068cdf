//! Process runners for sensuctl.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Captured result of one process run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed run with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs a program to completion.
pub trait Runner: Send + Sync {
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<CommandOutput>;
}

/// Runner that spawns a real child process.
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
        let spawn_error = |e: std::io::Error| Error::Command {
            args: args.join(" "),
            stderr: format!("failed to execute {program}: {e}"),
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// One recorded call to a [`MockRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

#[derive(Debug, Default)]
struct MockRunnerState {
    outputs: VecDeque<CommandOutput>,
    calls: Vec<Invocation>,
}

/// Runner that replays queued outputs and records every call.
///
/// When the queue is empty, calls succeed with empty stdout.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    state: Arc<Mutex<MockRunnerState>>,
}

impl MockRunner {
    /// Create a runner with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockRunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a full output.
    pub fn push_output(&self, output: CommandOutput) {
        self.state().outputs.push_back(output);
    }

    /// Queue a successful run printing `stdout`.
    pub fn push_stdout(&self, stdout: &str) {
        self.push_output(CommandOutput::ok(stdout));
    }

    /// Queue a failed run printing `stderr`.
    pub fn push_failure(&self, stderr: &str) {
        self.push_output(CommandOutput::failed(stderr));
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Invocation> {
        self.state().calls.clone()
    }
}

impl Runner for MockRunner {
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
        let mut state = self.state();
        state.calls.push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            stdin: stdin.map(str::to_string),
        });
        Ok(state
            .outputs
            .pop_front()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}
