// SPDX-License-Identifier: GPL-3.0-only

//! External command execution
//!
//! Every tool invocation goes through [`CommandRunner`] so reconcilers can be
//! driven by a scripted runner in tests. [`SystemRunner`] is the production
//! implementation backed by `std::process::Command`.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, error, info};

use crate::{Result, SysError};

/// A fully rendered tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Bytes fed to the child's standard input
    pub stdin: Option<Vec<u8>>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().display().to_string(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-like rendering used for logs and error context
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn into_failure(self, command: &ToolCommand) -> SysError {
        SysError::CommandFailed {
            command: command.render(),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Seam for running external tools
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output regardless of exit status
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput>;

    /// Run a command, mapping a non-zero exit status to [`SysError::CommandFailed`]
    fn run_checked(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let output = self.run(command)?;
        if output.success() {
            Ok(output)
        } else {
            let err = output.into_failure(command);
            error!("{err}");
            Err(err)
        }
    }
}

/// Runs commands on the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        info!(command = %command.render(), "executing");

        let spawn_err = |source| SysError::Spawn {
            command: command.program.clone(),
            source,
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(input) = &command.stdin
            && let Some(mut pipe) = child.stdin.take()
            && let Err(err) = pipe.write_all(input)
        {
            // reap the child before reporting
            drop(pipe);
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_err(err));
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        let output = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!(
            command = %command.program,
            status = ?output.status,
            stdout = %output.stdout.trim(),
            stderr = %output.stderr.trim(),
            "command finished"
        );

        Ok(output)
    }
}
