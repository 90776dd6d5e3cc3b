//! Identity, snapshot and usage types

use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Account names longer than this are truncated, matching the width the
/// accounting tool prints.
pub const MAX_IDENTITY_CHARS: usize = 8;

/// Prefix of the metadata line written at the top of every snapshot file
pub const DATE_MARKER: &str = "Date:";

/// Date format used in snapshot file names and metadata lines
pub const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "log";

/// Service accounts that never appear in a report
pub const SYSTEM_ACCOUNTS: [&str; 6] = ["root", "_apt", "sshd", "man", "fwupd-re", "www-data"];

/// Account name truncated to [`MAX_IDENTITY_CHARS`].
///
/// Two long names sharing their first eight characters compare equal. That
/// collision is inherited from the accounting output format and kept as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Truncate `raw` to an identity. Returns `None` for empty or
    /// whitespace-only names.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.chars().take(MAX_IDENTITY_CHARS).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for UserIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Identities eligible for reporting, derived once from the user registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowSet(HashSet<UserIdentity>);

impl AllowSet {
    pub fn contains(&self, identity: &UserIdentity) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<UserIdentity> for AllowSet {
    fn from_iter<I: IntoIterator<Item = UserIdentity>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identities always excluded, whatever the registry says
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenySet(HashSet<UserIdentity>);

impl DenySet {
    /// The built-in system account list
    pub fn system_default() -> Self {
        Self(
            SYSTEM_ACCOUNTS
                .iter()
                .filter_map(|name| UserIdentity::new(name))
                .collect(),
        )
    }

    /// Built-in list plus `extra` names. Never removes a built-in entry.
    pub fn with_extra<'a>(extra: impl IntoIterator<Item = &'a str>) -> Self {
        let mut deny = Self::system_default();
        deny.0.extend(extra.into_iter().filter_map(UserIdentity::new));
        deny
    }

    pub fn contains(&self, identity: &UserIdentity) -> bool {
        self.0.contains(identity)
    }
}

impl Default for DenySet {
    fn default() -> Self {
        Self::system_default()
    }
}

/// One day's raw accounting output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub raw: String,
}

impl Snapshot {
    pub fn new(date: NaiveDate, raw: impl Into<String>) -> Self {
        Self {
            date,
            raw: raw.into(),
        }
    }

    /// e.g. `2024-01-15.log`
    pub fn file_name(date: NaiveDate) -> String {
        format!(
            "{}.{}",
            date.format(SNAPSHOT_DATE_FORMAT),
            SNAPSHOT_EXTENSION
        )
    }

    /// Metadata line followed by the raw output
    pub fn to_file_contents(&self) -> String {
        format!(
            "{} {}\n{}\n",
            DATE_MARKER,
            self.date.format(SNAPSHOT_DATE_FORMAT),
            self.raw
        )
    }
}

/// Fixed-point resolution of stored CPU time
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Convert CPU-seconds to whole microseconds.
/// Negative or non-finite values yield `None`.
pub fn seconds_to_micros(seconds: f64) -> Option<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * MICROS_PER_SECOND as f64).round() as u64)
}

pub fn micros_to_seconds(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_SECOND as f64
}

/// Identity → CPU time, iterating in first-seen order.
///
/// Totals are kept as integer microseconds so that summing is exact and
/// independent of the order values arrive in. Equality ignores order: two
/// values are equal when they hold the same identities with the same totals.
#[derive(Debug, Clone, Default)]
pub struct UserUsage {
    order: Vec<UserIdentity>,
    micros: HashMap<UserIdentity, u64>,
}

impl UserUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `seconds` to `identity`, appending it if unseen.
    /// Negative or non-finite values are ignored.
    pub fn add(&mut self, identity: &UserIdentity, seconds: f64) {
        if let Some(micros) = seconds_to_micros(seconds) {
            self.add_micros(identity, micros);
        }
    }

    pub fn add_micros(&mut self, identity: &UserIdentity, micros: u64) {
        match self.micros.get_mut(identity) {
            Some(total) => *total = total.saturating_add(micros),
            None => {
                self.order.push(identity.clone());
                self.micros.insert(identity.clone(), micros);
            }
        }
    }

    /// Total in seconds
    pub fn get(&self, identity: &str) -> Option<f64> {
        self.get_micros(identity).map(micros_to_seconds)
    }

    pub fn get_micros(&self, identity: &str) -> Option<u64> {
        UserIdentity::new(identity).and_then(|id| self.micros.get(&id).copied())
    }

    /// Totals in microseconds, in first-seen order
    pub fn iter_micros(&self) -> impl Iterator<Item = (&UserIdentity, u64)> + '_ {
        self.order
            .iter()
            .map(move |id| (id, self.micros.get(id).copied().unwrap_or(0)))
    }

    /// Totals in seconds, in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&UserIdentity, f64)> + '_ {
        self.iter_micros()
            .map(|(id, micros)| (id, micros_to_seconds(micros)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Totals converted to hours, for chart consumers
    pub fn hours(&self) -> Vec<(UserIdentity, f64)> {
        self.iter()
            .map(|(id, secs)| (id.clone(), secs / 3600.0))
            .collect()
    }
}

impl PartialEq for UserUsage {
    fn eq(&self, other: &Self) -> bool {
        self.micros == other.micros
    }
}

impl Serialize for UserUsage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, secs) in self.iter() {
            map.serialize_entry(id, &secs)?;
        }
        map.end()
    }
}

/// Parsed, filtered usage of a single snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub usage: UserUsage,
}

/// Usage summed across every retained snapshot.
/// Rebuilt from scratch on each run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CumulativeUsage(pub UserUsage);

impl CumulativeUsage {
    pub fn get(&self, identity: &str) -> Option<f64> {
        self.0.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserIdentity, f64)> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hours(&self) -> Vec<(UserIdentity, f64)> {
        self.0.hours()
    }
}

/// Line counts collected while parsing a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    /// Blank lines and `Date:` metadata lines
    pub headers: usize,
    /// Identity outside the allow set or inside the deny set
    pub filtered: usize,
    /// Fewer than two fields, or a bad CPU-seconds value
    pub malformed: usize,
    pub accepted: usize,
}
