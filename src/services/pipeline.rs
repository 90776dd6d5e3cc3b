//! Daily capture → prune → aggregate → report run

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::parsers::{SaParser, SnapshotParser};
use crate::services::report::ReportFormatter;
use crate::services::source::SnapshotSource;
use crate::services::store::{SnapshotRef, SnapshotStore, DEFAULT_RETENTION};
use crate::services::Aggregator;
use crate::types::{AllowSet, CumulativeUsage, DenySet, Result, UsertimeError};

/// What a daily run produced
#[derive(Debug)]
pub struct RunOutcome {
    /// File written for today's capture, if it succeeded
    pub captured: Option<PathBuf>,
    /// Snapshots deleted to stay within the retention window
    pub pruned: Vec<SnapshotRef>,
    pub usage: CumulativeUsage,
    pub report: String,
    /// Set when today's capture failed; older snapshots were still reported
    pub capture_error: Option<UsertimeError>,
}

/// Outcome of the capture step alone
#[derive(Debug)]
pub struct CaptureOutcome {
    pub path: PathBuf,
    pub pruned: Vec<SnapshotRef>,
}

pub struct DailyPipeline<S> {
    source: S,
    store: SnapshotStore,
    parser: SaParser,
    allow: AllowSet,
    deny: DenySet,
    retention: usize,
}

impl<S: SnapshotSource> DailyPipeline<S> {
    pub fn new(source: S, store: SnapshotStore, allow: AllowSet, deny: DenySet) -> Self {
        Self {
            source,
            store,
            parser: SaParser::new(),
            allow,
            deny,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Capture today's snapshot, make room for it, then write it.
    ///
    /// Nothing is pruned when the capture itself fails.
    pub fn capture(&self) -> Result<CaptureOutcome> {
        let snapshot = self.source.capture()?;
        let pruned = self.store.prune_for_capture(snapshot.date, self.retention)?;
        let path = self.store.put(&snapshot)?;
        Ok(CaptureOutcome { path, pruned })
    }

    /// Parse every retained snapshot and sum the results
    pub fn aggregate(&self) -> Result<CumulativeUsage> {
        let refs = self.store.list()?;
        let mut records = Vec::with_capacity(refs.len());

        for snapshot_ref in &refs {
            let snapshot = snapshot_ref.load()?;
            let (record, stats) = self
                .parser
                .parse_with_stats(&snapshot, &self.allow, &self.deny);
            debug!(
                date = %snapshot.date,
                parser = self.parser.name(),
                lines = stats.lines,
                accepted = stats.accepted,
                filtered = stats.filtered,
                malformed = stats.malformed,
                "Parsed snapshot"
            );
            records.push(record);
        }

        let usage = Aggregator::aggregate(&records);
        info!(
            snapshots = refs.len(),
            users = usage.len(),
            "Aggregated CPU usage"
        );
        Ok(usage)
    }

    /// Full daily run under the store's run lock.
    ///
    /// A failed capture is reported in the outcome instead of aborting, so
    /// the retained days are still summarised. Store errors abort the run.
    pub fn run(&self) -> Result<RunOutcome> {
        let _lock = self.store.lock()?;

        let (captured, pruned, capture_error) = match self.capture() {
            Ok(outcome) => (Some(outcome.path), outcome.pruned, None),
            Err(e @ UsertimeError::SourceUnavailable(_)) => {
                warn!(error = %e, "Capture failed; reporting retained snapshots only");
                (None, Vec::new(), Some(e))
            }
            Err(e) => return Err(e),
        };

        let usage = self.aggregate()?;
        let report = ReportFormatter::format(&usage);

        Ok(RunOutcome {
            captured,
            pruned,
            usage,
            report,
            capture_error,
        })
    }
}
