//! External-process port and its tokio implementation

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{PipelineError, Result};

/// A fully resolved command line for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl StageCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How a finished process exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Port for running stage commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the command to completion
    ///
    /// Returns an error only when the process could not be started or did
    /// not finish in time; a non-zero exit is a normal [`ProcessExit`].
    async fn run(&self, command: &StageCommand) -> Result<ProcessExit>;
}

/// Runs commands with `tokio::process`, killing them on timeout
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &StageCommand) -> Result<ProcessExit> {
        tracing::debug!(command = %command, "Spawning stage process");

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child).await.map_err(|_| {
                PipelineError::Timeout { program: command.program.clone(), timeout }
            })?,
            None => child.await,
        }
        .map_err(|e| PipelineError::Spawn {
            program: command.program.clone(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(program = %command.program.display(), "{}", line);
        }

        Ok(ProcessExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
