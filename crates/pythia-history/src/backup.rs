//! Snapshot storage in the hidden history directory

use chrono::{Local, NaiveDateTime, Timelike};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use pythia_core::{filename_of, PythiaError, Result};

/// Timestamp embedded in snapshot names, precise to the second.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extension of every snapshot file.
pub const SNAPSHOT_SUFFIX: &str = ".bak";

/// Width of a rendered `TIMESTAMP_FORMAT` value.
const TIMESTAMP_WIDTH: usize = 15;

/// One immutable copy of a file, as found in the history directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    pub original_filename: String,
    pub timestamp: NaiveDateTime,
    /// Disambiguates snapshots taken within the same second (0 for the first)
    pub sequence: u32,
    pub path: PathBuf,
}

impl BackupSnapshot {
    /// Read the snapshot, replacing invalid UTF-8.
    pub fn read_content(&self) -> Result<String> {
        let bytes = fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Snapshot file name (without directory).
    pub fn file_name(&self) -> String {
        filename_of(&self.path)
    }

    /// Parse `<filename>_<timestamp>[_<n>].bak` for a known original name.
    ///
    /// Returns `None` for anything that does not belong to `filename`,
    /// including names that merely share a prefix (`a.py_old.py_...`).
    fn parse(filename: &str, entry_name: &str, path: PathBuf) -> Option<Self> {
        let middle = entry_name
            .strip_prefix(filename)?
            .strip_prefix('_')?
            .strip_suffix(SNAPSHOT_SUFFIX)?;

        let stamp = middle.get(..TIMESTAMP_WIDTH)?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

        let sequence = match &middle[TIMESTAMP_WIDTH..] {
            "" => 0,
            rest => rest.strip_prefix('_')?.parse().ok()?,
        };

        Some(Self {
            original_filename: filename.to_string(),
            timestamp,
            sequence,
            path,
        })
    }
}

/// Reads and writes snapshots for one watched folder.
#[derive(Debug, Clone)]
pub struct BackupStore {
    history_dir: PathBuf,
}

impl BackupStore {
    /// `history_dir_name` is resolved inside `folder`.
    pub fn new(folder: &Path, history_dir_name: &str) -> Self {
        Self {
            history_dir: folder.join(history_dir_name),
        }
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    /// Copy the current content of `path` into a new snapshot.
    pub fn snapshot(&self, path: &Path) -> Result<BackupSnapshot> {
        self.snapshot_at(path, Local::now().naive_local())
    }

    /// Copy the current content of `path` into a snapshot stamped `at`.
    ///
    /// An existing snapshot is never overwritten: a second snapshot within the
    /// same second gets a `_1`, `_2`, ... suffix.
    pub fn snapshot_at(&self, path: &Path, at: NaiveDateTime) -> Result<BackupSnapshot> {
        let filename = filename_of(path);
        if filename.is_empty() {
            return Err(PythiaError::Backup(format!(
                "Cannot snapshot {}: no file name",
                path.display()
            )));
        }

        let content = fs::read(path).map_err(|e| {
            PythiaError::Backup(format!("Failed to read {}: {}", path.display(), e))
        })?;

        fs::create_dir_all(&self.history_dir).map_err(|e| {
            PythiaError::Backup(format!(
                "Failed to create {}: {}",
                self.history_dir.display(),
                e
            ))
        })?;

        // Whole seconds, so the returned value matches what `list` parses
        let timestamp = at.with_nanosecond(0).unwrap_or(at);
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();

        let mut sequence = 0u32;
        loop {
            let name = if sequence == 0 {
                format!("{}_{}{}", filename, stamp, SNAPSHOT_SUFFIX)
            } else {
                format!("{}_{}_{}{}", filename, stamp, sequence, SNAPSHOT_SUFFIX)
            };
            let target = self.history_dir.join(&name);

            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(mut file) => {
                    file.write_all(&content).map_err(|e| {
                        PythiaError::Backup(format!("Failed to write {}: {}", target.display(), e))
                    })?;
                    info!("Saved snapshot {}", name);
                    return Ok(BackupSnapshot {
                        original_filename: filename,
                        timestamp,
                        sequence,
                        path: target,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Snapshot {} exists, trying next sequence", name);
                    sequence += 1;
                }
                Err(e) => {
                    return Err(PythiaError::Backup(format!(
                        "Failed to create {}: {}",
                        target.display(),
                        e
                    )));
                }
            }
        }
    }

    /// All snapshots of `filename`, oldest first.
    pub fn list(&self, filename: &str) -> Result<Vec<BackupSnapshot>> {
        let entries = match fs::read_dir(&self.history_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(snapshot) = BackupSnapshot::parse(filename, &name, entry.path()) {
                snapshots.push(snapshot);
            }
        }

        snapshots.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });
        Ok(snapshots)
    }

    /// The newest snapshot of `filename`, if any.
    pub fn latest(&self, filename: &str) -> Result<Option<BackupSnapshot>> {
        Ok(self.list(filename)?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_snapshot_name_and_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x=1").unwrap();

        let store = BackupStore::new(dir.path(), ".pythia_history");
        let snap = store.snapshot_at(&file, at(10, 0, 0)).unwrap();

        assert_eq!(snap.file_name(), "a.py_20240101_100000.bak");
        assert_eq!(snap.read_content().unwrap(), "x=1");
        assert!(store.history_dir().is_dir());
    }

    #[test]
    fn test_same_second_snapshots_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        let store = BackupStore::new(dir.path(), ".history");

        fs::write(&file, "first").unwrap();
        let first = store.snapshot_at(&file, at(10, 0, 0)).unwrap();
        fs::write(&file, "second").unwrap();
        let second = store.snapshot_at(&file, at(10, 0, 0)).unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.file_name(), "a.py_20240101_100000_1.bak");
        assert_eq!(first.read_content().unwrap(), "first");

        let latest = store.latest("a.py").unwrap().unwrap();
        assert_eq!(latest.read_content().unwrap(), "second");
    }

    #[test]
    fn test_list_orders_by_timestamp() {
        let dir = TempDir::new().unwrap();
        let history = dir.path().join(".history");
        fs::create_dir_all(&history).unwrap();
        fs::write(history.join("f.txt_20240101_120000.bak"), "noon").unwrap();
        fs::write(history.join("f.txt_20240101_100000.bak"), "morning").unwrap();

        let store = BackupStore::new(dir.path(), ".history");
        let snaps = store.list("f.txt").unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].timestamp, at(10, 0, 0));

        let latest = store.latest("f.txt").unwrap().unwrap();
        assert_eq!(latest.file_name(), "f.txt_20240101_120000.bak");
    }

    #[test]
    fn test_list_excludes_other_files_sharing_prefix() {
        let dir = TempDir::new().unwrap();
        let history = dir.path().join(".history");
        fs::create_dir_all(&history).unwrap();
        fs::write(history.join("a.py_20240101_100000.bak"), "mine").unwrap();
        fs::write(history.join("a.py_old.py_20240102_100000.bak"), "other").unwrap();
        fs::write(history.join("a.py_notes.txt"), "junk").unwrap();

        let store = BackupStore::new(dir.path(), ".history");
        let snaps = store.list("a.py").unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].read_content().unwrap(), "mine");

        assert_eq!(store.list("a.py_old.py").unwrap().len(), 1);
    }

    #[test]
    fn test_list_without_history_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path(), ".history");
        assert!(store.list("a.py").unwrap().is_empty());
        assert!(store.latest("a.py").unwrap().is_none());
    }

    #[test]
    fn test_snapshot_missing_file_is_backup_error() {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path(), ".history");
        let err = store.snapshot(&dir.path().join("gone.py")).unwrap_err();
        assert!(matches!(err, PythiaError::Backup(_)));
    }
}
