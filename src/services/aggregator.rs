//! Aggregator service for merging per-snapshot usage

use crate::types::{CumulativeUsage, UsageRecord, UserUsage};

/// Aggregator for computing cumulative usage
pub struct Aggregator;

impl Aggregator {
    /// Sum CPU-seconds per identity across `records`.
    ///
    /// Sums are exact integer microseconds, so totals do not depend on input
    /// order. Identities are listed in the order they first appear, so
    /// date-ascending input gives stable output.
    pub fn aggregate(records: &[UsageRecord]) -> CumulativeUsage {
        let mut total = UserUsage::new();
        for record in records {
            for (identity, micros) in record.usage.iter_micros() {
                total.add_micros(identity, micros);
            }
        }
        CumulativeUsage(total)
    }
}
