// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles for the command and device seams
//!
//! [`ScriptedRunner`] answers commands from a script of rules and records
//! everything it was asked to run; [`FakeInspector`] reports canned usage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::Result;
use crate::command::{CommandOutput, CommandRunner, ToolCommand};
use crate::device::{BlockDeviceInspector, DeviceUsage};

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    output: CommandOutput,
    once: bool,
}

/// Command runner driven by substring rules.
///
/// Rules are matched against the rendered command line in insertion order;
/// `*_once` rules are consumed by their first match. Unmatched commands
/// succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    executed: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, pattern: &str, output: CommandOutput, once: bool) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                pattern: pattern.to_string(),
                output,
                once,
            });
        self
    }

    /// Succeed with `stdout` for every matching command
    pub fn respond(self, pattern: &str, stdout: &str) -> Self {
        let output = CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        };
        self.push(pattern, output, false)
    }

    /// Succeed with `stdout` for the next matching command only
    pub fn respond_once(self, pattern: &str, stdout: &str) -> Self {
        let output = CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        };
        self.push(pattern, output, true)
    }

    /// Exit with `status` for every matching command
    pub fn fail(self, pattern: &str, status: i32, stderr: &str) -> Self {
        let output = CommandOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_string(),
        };
        self.push(pattern, output, false)
    }

    /// Exit with `status` for the next matching command only
    pub fn fail_once(self, pattern: &str, status: i32, stderr: &str) -> Self {
        let output = CommandOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_string(),
        };
        self.push(pattern, output, true)
    }

    /// Every command run so far, in order
    pub fn commands(&self) -> Vec<ToolCommand> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered command lines run so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.commands().iter().map(ToolCommand::render).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let rendered = command.render();
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(idx) = rules.iter().position(|rule| rendered.contains(&rule.pattern)) else {
            return Ok(CommandOutput {
                status: Some(0),
                ..Default::default()
            });
        };

        let output = rules[idx].output.clone();
        if rules[idx].once {
            rules.remove(idx);
        }
        Ok(output)
    }
}

/// Inspector that resolves every path to itself and reports canned usage
#[derive(Debug, Default)]
pub struct FakeInspector {
    usage: HashMap<String, DeviceUsage>,
    links: HashMap<String, String>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_usage(mut self, device: &str, usage: DeviceUsage) -> Self {
        self.usage.insert(device.to_string(), usage);
        self
    }

    /// Resolve `link` to `target` instead of to itself
    pub fn with_link(mut self, link: &str, target: &str) -> Self {
        self.links.insert(link.to_string(), target.to_string());
        self
    }
}

impl BlockDeviceInspector for FakeInspector {
    fn resolve(&self, device: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(
            self.links.get(device).map_or(device, String::as_str),
        ))
    }

    fn usage(&self, device: &str) -> Result<DeviceUsage> {
        Ok(self.usage.get(device).cloned().unwrap_or_default())
    }
}
