//! Parser for `sa -u` snapshot text

use crate::types::{
    seconds_to_micros, AllowSet, DenySet, ParseStats, Snapshot, UsageRecord, UserIdentity,
    UserUsage, DATE_MARKER,
};

use super::SnapshotParser;

/// Parser for the per-user lines printed by `sa -u`.
///
/// Only the first two fields of a line are read: the account name and its
/// CPU-seconds. Everything after them is ignored.
#[derive(Debug, Default)]
pub struct SaParser;

impl SaParser {
    pub fn new() -> Self {
        Self
    }

    /// CPU-seconds must be a finite, non-negative number; kept as microseconds
    fn parse_micros(field: &str) -> Option<u64> {
        let seconds: f64 = field.parse().ok()?;
        seconds_to_micros(seconds)
    }
}

impl SnapshotParser for SaParser {
    fn name(&self) -> &str {
        "sa"
    }

    fn parse_with_stats(
        &self,
        snapshot: &Snapshot,
        allow: &AllowSet,
        deny: &DenySet,
    ) -> (UsageRecord, ParseStats) {
        let mut usage = UserUsage::new();
        let mut stats = ParseStats::default();

        for line in snapshot.raw.lines() {
            stats.lines += 1;

            if line.trim().is_empty() || line.starts_with(DATE_MARKER) {
                stats.headers += 1;
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(name), Some(seconds)) = (fields.next(), fields.next()) else {
                stats.malformed += 1;
                continue;
            };

            let Some(identity) = UserIdentity::new(name) else {
                stats.malformed += 1;
                continue;
            };
            if !allow.contains(&identity) || deny.contains(&identity) {
                stats.filtered += 1;
                continue;
            }

            match Self::parse_micros(seconds) {
                Some(micros) => {
                    usage.add_micros(&identity, micros);
                    stats.accepted += 1;
                }
                None => stats.malformed += 1,
            }
        }

        (
            UsageRecord {
                date: snapshot.date,
                usage,
            },
            stats,
        )
    }
}
