//! Accounting snapshot source backed by an external command

use std::process::Command;

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::types::{Result, Snapshot, UsertimeError};

/// Command run when none is configured
pub const DEFAULT_ACCOUNTING_COMMAND: &str = "sudo sa -u";

/// Anything that can produce today's raw accounting snapshot
pub trait SnapshotSource {
    fn capture(&self) -> Result<Snapshot>;
}

/// Runs an accounting command and keeps its stdout as the snapshot text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingCommand {
    program: String,
    args: Vec<String>,
}

impl AccountingCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace (no shell quoting)
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| UsertimeError::Config("accounting command is empty".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    /// Run the command and tag its output with `date`
    pub fn capture_on(&self, date: NaiveDate) -> Result<Snapshot> {
        debug!(program = %self.program, args = ?self.args, "Running accounting command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| {
                UsertimeError::SourceUnavailable(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UsertimeError::SourceUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(Snapshot::new(
            date,
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}

impl Default for AccountingCommand {
    fn default() -> Self {
        Self::new("sudo", vec!["sa".into(), "-u".into()])
    }
}

impl SnapshotSource for AccountingCommand {
    fn capture(&self) -> Result<Snapshot> {
        self.capture_on(Local::now().date_naive())
    }
}
