mod logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::parsers::{scan_registry, DEFAULT_HOME_ROOT, DEFAULT_PASSWD_PATH};
use crate::services::{
    AccountingCommand, CaptureOutcome, DailyPipeline, ReportFormatter, SnapshotStore,
    DEFAULT_ACCOUNTING_COMMAND, DEFAULT_LOG_DIR, DEFAULT_RETENTION,
};
use crate::types::{DenySet, Result, UsertimeError};

pub use logging::setup_logging;

/// Per-user CPU time from daily accounting snapshots
#[derive(Parser)]
#[command(name = "usertime")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log filter directive (e.g. "info", "debug")
    #[arg(long, env = "USERTIME_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture today's snapshot and print the report (default)
    Run,

    /// Capture today's snapshot only
    Capture,

    /// Print the report from stored snapshots without capturing
    Report {
        /// Output per-user CPU-seconds as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the retention window without capturing
    Prune,
}

/// Runtime configuration; every flag has an environment fallback
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Directory holding one snapshot file per day
    #[arg(long, env = "USERTIME_LOG_DIR", default_value = DEFAULT_LOG_DIR, global = true)]
    pub log_dir: PathBuf,

    /// Number of daily snapshots to keep
    #[arg(long, env = "USERTIME_RETENTION", default_value_t = DEFAULT_RETENTION, global = true)]
    pub retention: usize,

    /// User registry in passwd format
    #[arg(long, env = "USERTIME_PASSWD", default_value = DEFAULT_PASSWD_PATH, global = true)]
    pub passwd: PathBuf,

    /// Directories under which a home directory makes an account reportable
    #[arg(
        long = "home-root",
        env = "USERTIME_HOME_ROOTS",
        value_delimiter = ',',
        default_value = DEFAULT_HOME_ROOT,
        global = true
    )]
    pub home_roots: Vec<PathBuf>,

    /// Extra account names to exclude, on top of the built-in system accounts
    #[arg(long, global = true)]
    pub deny: Vec<String>,

    /// Command printing per-user CPU-seconds
    #[arg(
        long,
        env = "USERTIME_ACCOUNTING_COMMAND",
        default_value = DEFAULT_ACCOUNTING_COMMAND,
        global = true
    )]
    pub accounting_command: String,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.retention == 0 {
            return Err(UsertimeError::Config(
                "retention must keep at least one snapshot".into(),
            ));
        }
        if self.home_roots.is_empty() {
            return Err(UsertimeError::Config("no home root configured".into()));
        }
        Ok(())
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.log_dir.clone())
    }

    pub fn deny_set(&self) -> DenySet {
        DenySet::with_extra(self.deny.iter().map(String::as_str))
    }

    /// Scans the registry, so only build this once per run
    pub fn pipeline(&self) -> Result<DailyPipeline<AccountingCommand>> {
        let allow = scan_registry(&self.passwd, &self.home_roots)?;
        let source = AccountingCommand::from_command_line(&self.accounting_command)?;
        Ok(
            DailyPipeline::new(source, self.store(), allow, self.deny_set())
                .with_retention(self.retention),
        )
    }

    /// Capture today's snapshot under the store's run lock
    pub fn capture(&self) -> Result<CaptureOutcome> {
        let pipeline = self.pipeline()?;
        let _lock = pipeline.store().lock()?;
        pipeline.capture()
    }

    /// Render stored snapshots as a table, or as JSON seconds per user
    pub fn report(&self, json: bool) -> anyhow::Result<String> {
        let pipeline = self.pipeline()?;
        let _lock = pipeline.store().lock()?;
        let usage = pipeline.aggregate()?;
        if json {
            Ok(serde_json::to_string_pretty(&usage)?)
        } else {
            Ok(ReportFormatter::format(&usage))
        }
    }
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        setup_logging(&self.log_level)?;
        self.settings.validate()?;

        match self.command {
            None | Some(Commands::Run) => {
                let pipeline = self.settings.pipeline()?;
                let outcome = pipeline.run()?;
                println!("{}", outcome.report);
                match outcome.capture_error {
                    Some(e) => Err(e.into()),
                    None => Ok(()),
                }
            }
            Some(Commands::Capture) => {
                let outcome = self.settings.capture()?;
                for removed in &outcome.pruned {
                    println!("Removed {}", removed.path.display());
                }
                println!("Saved {}", outcome.path.display());
                Ok(())
            }
            Some(Commands::Report { json }) => {
                println!("{}", self.settings.report(json)?);
                Ok(())
            }
            Some(Commands::Prune) => {
                let store = self.settings.store();
                let _lock = store.lock()?;
                for removed in store.prune(self.settings.retention)? {
                    println!("Removed {}", removed.path.display());
                }
                Ok(())
            }
        }
    }
}
