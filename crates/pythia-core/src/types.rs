//! Core type definitions for Pythia

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

/// A file inside the watched folder, sampled at the moment an event is handled.
///
/// Content is read on demand and never cached across events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub filename: String,
    /// Lowercased extension without the dot (empty when there is none)
    pub extension: String,
    pub size: u64,
}

impl WatchedFile {
    /// Describe `path` without touching the disk.
    pub fn describe(path: &Path, size: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            filename: filename_of(path),
            extension: extension_of(path),
            size,
        }
    }

    /// Stat `path`. Returns `None` when it no longer exists or is not a file.
    pub fn stat(path: &Path) -> Result<Option<Self>> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(Some(Self::describe(path, meta.len()))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the current content, replacing invalid UTF-8.
    pub fn read_content(&self) -> Result<String> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) if idx > 0 => &self.filename[..idx],
            _ => &self.filename,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Base name of a path as an owned string.
pub fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lowercased extension of a path, without the dot.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// A filesystem notification, already translated from the watch backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Event kinds the classifier distinguishes between.
///
/// Renames reach the classifier as `Created` for the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Created,
    Modified,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// How an empty file should be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateMode {
    /// Write new content from the file name and recalled knowledge
    Compose { query: String },
    /// Draw a diagram of a sibling source file
    Visualize { source: PathBuf },
}

/// Why an event was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    HiddenOrTemporary,
    PlaceholderName,
    UnsupportedExtension,
    Missing,
    EmptyModification,
    MissingDiagramSource { stem: String },
    SelfWrite,
    WorkInProgress,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HiddenOrTemporary => write!(f, "hidden or temporary file"),
            Self::PlaceholderName => write!(f, "editor placeholder name"),
            Self::UnsupportedExtension => write!(f, "unsupported extension"),
            Self::Missing => write!(f, "file no longer exists"),
            Self::EmptyModification => write!(f, "empty file modified"),
            Self::MissingDiagramSource { stem } => {
                write!(f, "no source file found for diagram '{}'", stem)
            }
            Self::SelfWrite => write!(f, "echo of our own write"),
            Self::WorkInProgress => write!(f, "generation in progress"),
        }
    }
}

/// What the classifier decided an event means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Generate(GenerateMode),
    Refactor { instruction: String },
    Rollback,
    Memorize,
    Ignore(IgnoreReason),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_describe_splits_name() {
        let file = WatchedFile::describe(Path::new("/tmp/x/Generate_Plan.MD"), 0);
        assert_eq!(file.filename, "Generate_Plan.MD");
        assert_eq!(file.extension, "md");
        assert_eq!(file.stem(), "Generate_Plan");
        assert!(file.is_empty());
    }

    #[test]
    fn test_stem_of_dotfile_is_whole_name() {
        let file = WatchedFile::describe(Path::new(".env"), 3);
        assert_eq!(file.stem(), ".env");
        assert_eq!(file.extension, "");
    }

    #[test]
    fn test_stat_missing_file() {
        let dir = TempDir::new().unwrap();
        let stat = WatchedFile::stat(&dir.path().join("gone.txt")).unwrap();
        assert!(stat.is_none());
    }

    #[test]
    fn test_stat_directory_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(WatchedFile::stat(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_stat_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "hello").unwrap();

        let file = WatchedFile::stat(&path).unwrap().unwrap();
        assert_eq!(file.size, 5);
        assert_eq!(file.read_content().unwrap(), "hello");
    }
}
