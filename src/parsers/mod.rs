//! Parsers for accounting snapshots and the user registry

mod passwd;
mod sa;

pub use passwd::{scan_registry, RegistryEntry, DEFAULT_HOME_ROOT, DEFAULT_PASSWD_PATH};
pub use sa::SaParser;

use crate::types::{AllowSet, DenySet, ParseStats, Snapshot, UsageRecord};

/// Trait for turning a snapshot's raw text into per-user CPU-seconds
pub trait SnapshotParser {
    /// Parser name (e.g., "sa")
    fn name(&self) -> &str;

    /// Parse a snapshot, keeping only identities in `allow` and not in `deny`.
    /// Malformed lines are counted in the returned stats, never an error.
    fn parse_with_stats(
        &self,
        snapshot: &Snapshot,
        allow: &AllowSet,
        deny: &DenySet,
    ) -> (UsageRecord, ParseStats);

    /// Parse a snapshot, discarding line statistics
    fn parse(&self, snapshot: &Snapshot, allow: &AllowSet, deny: &DenySet) -> UsageRecord {
        self.parse_with_stats(snapshot, allow, deny).0
    }
}
