//! Services for capturing, storing and summarising accounting snapshots

pub mod aggregator;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;

pub use aggregator::Aggregator;
pub use pipeline::{CaptureOutcome, DailyPipeline, RunOutcome};
pub use report::{human_readable_time, ReportFormatter};
pub use source::{AccountingCommand, SnapshotSource, DEFAULT_ACCOUNTING_COMMAND};
pub use store::{RunLock, SnapshotRef, SnapshotStore, DEFAULT_LOG_DIR, DEFAULT_RETENTION};
