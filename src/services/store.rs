//! On-disk snapshot store with a rolling retention window
//!
//! One file per calendar day, named `YYYY-MM-DD.log`, so lexical order of
//! file names is chronological order.

use chrono::NaiveDate;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{
    Result, Snapshot, UsertimeError, SNAPSHOT_DATE_FORMAT, SNAPSHOT_EXTENSION,
};

/// Directory used when none is configured
pub const DEFAULT_LOG_DIR: &str = "/var/log/user_cpu_usage";

/// Snapshots kept after a daily run
pub const DEFAULT_RETENTION: usize = 7;

const LOCK_FILE: &str = ".lock";

/// A stored snapshot that has not been read yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef {
    pub date: NaiveDate,
    pub path: PathBuf,
}

impl SnapshotRef {
    /// Read the file back. Invalid UTF-8 is replaced rather than rejected so
    /// one damaged line cannot hide the rest of the day.
    pub fn load(&self) -> Result<Snapshot> {
        let bytes = fs::read(&self.path).map_err(|e| UsertimeError::persistence(&self.path, e))?;
        Ok(Snapshot::new(
            self.date,
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    fn file_name(&self) -> String {
        Snapshot::file_name(self.date)
    }
}

/// Exclusive claim on a store directory, released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(Snapshot::file_name(date))
    }

    /// Write (or overwrite) the file for the snapshot's day.
    /// Uses temp file + rename so a reader never sees a half-written day.
    pub fn put(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| UsertimeError::persistence(&self.dir, e))?;

        let path = self.snapshot_path(snapshot.date);
        let temp_path = path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));

        {
            let mut file =
                File::create(&temp_path).map_err(|e| UsertimeError::persistence(&temp_path, e))?;
            file.write_all(snapshot.to_file_contents().as_bytes())
                .map_err(|e| UsertimeError::persistence(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| UsertimeError::persistence(&temp_path, e))?;
        }

        fs::rename(&temp_path, &path).map_err(|e| UsertimeError::persistence(&path, e))?;

        info!("CPU usage log for {} has been saved to {}", snapshot.date, path.display());
        Ok(path)
    }

    /// All stored snapshots, oldest first. A missing directory is an empty store.
    pub fn list(&self) -> Result<Vec<SnapshotRef>> {
        match fs::metadata(&self.dir) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(UsertimeError::persistence(&self.dir, e)),
        }

        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            SNAPSHOT_EXTENSION
        );

        let paths = glob::glob(&pattern)
            .map_err(|e| UsertimeError::Config(format!("bad snapshot pattern: {}", e)))?;

        let mut refs = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                UsertimeError::persistence(path, e.into_error())
            })?;
            if !path.is_file() {
                continue;
            }
            match Self::date_from_path(&path) {
                Some(date) => refs.push(SnapshotRef { date, path }),
                None => debug!("Ignoring non-snapshot file {}", path.display()),
            }
        }

        refs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(refs)
    }

    /// Delete the oldest snapshots until at most `retention` remain.
    /// Returns the removed snapshots, oldest first.
    pub fn prune(&self, retention: usize) -> Result<Vec<SnapshotRef>> {
        let refs = self.list()?;
        self.remove_oldest(refs, retention)
    }

    /// Prune ahead of writing the snapshot for `date`.
    ///
    /// The file for `date` is never removed, and it takes one of the
    /// `retention` slots, so once it is written the store holds at most
    /// `retention` snapshots.
    pub fn prune_for_capture(&self, date: NaiveDate, retention: usize) -> Result<Vec<SnapshotRef>> {
        let others: Vec<SnapshotRef> = self
            .list()?
            .into_iter()
            .filter(|r| r.date != date)
            .collect();
        self.remove_oldest(others, retention.saturating_sub(1))
    }

    /// Take the directory's run lock without blocking
    pub fn lock(&self) -> Result<RunLock> {
        fs::create_dir_all(&self.dir).map_err(|e| UsertimeError::persistence(&self.dir, e))?;

        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| UsertimeError::persistence(&path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(UsertimeError::Locked(format!(
                    "another run holds {}",
                    path.display()
                )));
            }
            return Err(UsertimeError::persistence(&path, e));
        }

        Ok(RunLock { file, path })
    }

    fn remove_oldest(&self, refs: Vec<SnapshotRef>, keep: usize) -> Result<Vec<SnapshotRef>> {
        if refs.len() <= keep {
            return Ok(Vec::new());
        }

        let excess = refs.len() - keep;
        let removed: Vec<SnapshotRef> = refs.into_iter().take(excess).collect();
        for snapshot in &removed {
            fs::remove_file(&snapshot.path)
                .map_err(|e| UsertimeError::persistence(&snapshot.path, e))?;
            info!("Removed {}", snapshot.file_name());
        }
        Ok(removed)
    }

    /// `2024-01-15.log` → 2024-01-15; anything not in canonical form → None
    fn date_from_path(path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(&format!(".{}", SNAPSHOT_EXTENSION))?;
        let date = NaiveDate::parse_from_str(stem, SNAPSHOT_DATE_FORMAT).ok()?;
        (Snapshot::file_name(date) == name).then_some(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn create_test_store() -> (SnapshotStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("user_cpu_usage"));
        (store, temp_dir)
    }

    fn put_days(store: &SnapshotStore, days: &[u32]) {
        for &d in days {
            store
                .put(&Snapshot::new(day(d), format!("alice {}", d)))
                .unwrap();
        }
    }

    fn listed_days(store: &SnapshotStore) -> Vec<NaiveDate> {
        store.list().unwrap().into_iter().map(|r| r.date).collect()
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let (store, _temp) = create_test_store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_put_creates_directory_and_file() {
        let (store, _temp) = create_test_store();
        let path = store.put(&Snapshot::new(day(15), "alice 3600")).unwrap();

        assert_eq!(path, store.dir().join("2024-01-15.log"));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Date: 2024-01-15\nalice 3600\n"
        );
        assert!(!path.with_extension("log.tmp").exists());
    }

    #[test]
    fn test_put_same_day_overwrites() {
        let (store, _temp) = create_test_store();
        store.put(&Snapshot::new(day(15), "alice 1")).unwrap();
        store.put(&Snapshot::new(day(15), "alice 2")).unwrap();

        let refs = store.list().unwrap();
        assert_eq!(refs.len(), 1);
        assert!(refs[0].load().unwrap().raw.contains("alice 2"));
    }

    #[test]
    fn test_list_sorted_ascending_and_ignores_other_files() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[20, 3, 11]);
        fs::write(store.dir().join("notes.log"), "x").unwrap();
        fs::write(store.dir().join("2024-1-5.log"), "x").unwrap();
        fs::write(store.dir().join("2024-01-06.txt"), "x").unwrap();
        fs::create_dir(store.dir().join("2024-01-07.log")).unwrap();

        assert_eq!(listed_days(&store), vec![day(3), day(11), day(20)]);
    }

    #[test]
    fn test_load_round_trips_raw_text_with_header() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[4]);
        let snapshot = store.list().unwrap()[0].load().unwrap();
        assert_eq!(snapshot.date, day(4));
        assert_eq!(snapshot.raw, "Date: 2024-01-04\nalice 4\n");
    }

    #[test]
    fn test_load_replaces_invalid_utf8() {
        let (store, _temp) = create_test_store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.snapshot_path(day(2)), b"bob \xff\xfe\nalice 60\n").unwrap();

        let snapshot = store.list().unwrap()[0].load().unwrap();
        assert!(snapshot.raw.contains("alice 60"));
    }

    #[test]
    fn test_load_deleted_file_is_persistence_error() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[1]);
        let snapshot_ref = store.list().unwrap().remove(0);
        fs::remove_file(&snapshot_ref.path).unwrap();

        let err = snapshot_ref.load().unwrap_err();
        assert!(matches!(err, UsertimeError::Persistence { .. }));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

        let removed = store.prune(7).unwrap();

        let removed_days: Vec<NaiveDate> = removed.iter().map(|r| r.date).collect();
        assert_eq!(removed_days, vec![day(1), day(2), day(3)]);
        assert_eq!(listed_days(&store), (4..=10).map(day).collect::<Vec<_>>());
    }

    #[test]
    fn test_prune_within_bound_is_noop() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[1, 2, 3]);
        assert!(store.prune(7).unwrap().is_empty());
        assert_eq!(listed_days(&store).len(), 3);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[9, 1, 5, 3, 7, 2, 8, 4, 6]);

        store.prune(7).unwrap();
        let first = listed_days(&store);
        let removed = store.prune(7).unwrap();
        let second = listed_days(&store);

        assert!(removed.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_retention_bound_after_puts() {
        let (store, _temp) = create_test_store();
        for d in 1..=12 {
            put_days(&store, &[d]);
            store.prune(DEFAULT_RETENTION).unwrap();
            let days = listed_days(&store);
            assert!(days.len() <= DEFAULT_RETENTION);
            let first = d.saturating_sub(DEFAULT_RETENTION as u32 - 1).max(1);
            assert_eq!(days, (first..=d).map(day).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_prune_for_capture_makes_room() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[1, 2, 3, 4, 5, 6, 7]);

        let removed = store.prune_for_capture(day(8), 7).unwrap();
        put_days(&store, &[8]);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].date, day(1));
        assert_eq!(listed_days(&store), (2..=8).map(day).collect::<Vec<_>>());
    }

    #[test]
    fn test_prune_for_capture_never_removes_target_day() {
        let (store, _temp) = create_test_store();
        // Target day is the oldest file present
        put_days(&store, &[1, 2, 3, 4, 5, 6, 7, 8]);

        store.prune_for_capture(day(1), 7).unwrap();

        let days = listed_days(&store);
        assert!(days.contains(&day(1)));
        assert_eq!(days.len(), 7);
    }

    #[test]
    fn test_prune_for_capture_rerun_same_day_keeps_window() {
        let (store, _temp) = create_test_store();
        put_days(&store, &[1, 2, 3, 4, 5, 6, 7]);

        store.prune_for_capture(day(7), 7).unwrap();
        put_days(&store, &[7]);

        assert_eq!(listed_days(&store), (1..=7).map(day).collect::<Vec<_>>());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let (store, _temp) = create_test_store();
        let lock = store.lock().unwrap();
        assert!(lock.path().ends_with(".lock"));

        let err = store.lock().unwrap_err();
        assert!(matches!(err, UsertimeError::Locked(_)));

        drop(lock);
        assert!(store.lock().is_ok());
    }

    #[test]
    fn test_lock_file_is_not_a_snapshot() {
        let (store, _temp) = create_test_store();
        let _lock = store.lock().unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
