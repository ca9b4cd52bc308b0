//! External command execution
//!
//! Every package-manager call, service toggle and probe goes through a
//! [`CommandRunner`], so provisioning logic can be exercised without touching
//! the host.

use std::fmt;
use std::process::{Command, Stdio};

use console::Style;
use tracing::{debug, warn};

use crate::error::{HostprepError, Result};

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A script run through `sh -c`
    pub fn shell(script: &str) -> Self {
        Self::new("sh", ["-c", script])
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[cfg(test)]
    pub fn failed(status: &str) -> Self {
        Self {
            success: false,
            status: status.to_string(),
            ..Self::default()
        }
    }
}

/// Runs OS commands and reports their outcome
pub trait CommandRunner {
    /// Run `cmd` to completion
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as
    /// an error; only failing to start the command is an error.
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Run `cmd` and turn a non-zero exit into [`HostprepError::CommandFailed`]
    fn check(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(cmd)?;
        if output.success {
            Ok(output)
        } else {
            Err(HostprepError::CommandFailed {
                command: cmd.to_string(),
                status: output.status,
            })
        }
    }
}

/// Keeps going through a sequence of fallible operations
///
/// Every failure is logged as it happens; [`Attempts::finish`] reports the
/// first one once the whole sequence has been tried.
#[derive(Debug, Default)]
pub struct Attempts {
    first_error: Option<HostprepError>,
}

impl Attempts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<T>(&mut self, result: Result<T>) {
        if let Err(e) = result {
            warn!("{e}");
            self.first_error.get_or_insert(e);
        }
    }

    /// Run `cmd`, recording a failure to start it or a non-zero exit
    pub fn check(&mut self, runner: &dyn CommandRunner, cmd: &CommandSpec) {
        self.record(runner.check(cmd));
    }

    pub fn finish(self) -> Result<()> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Runs commands on the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        debug!("running: {cmd}");

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HostprepError::CommandSpawnFailed {
                program: cmd.program.clone(),
                reason: e.to_string(),
            })?;

        let result = CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success {
            debug!("{cmd} exited with {}: {}", result.status, result.stderr.trim());
        }

        Ok(result)
    }
}

/// Prints commands instead of running them
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        println!("{} {cmd}", Style::new().bold().cyan().apply_to("would run"));
        Ok(CommandOutput::ok(""))
    }
}
