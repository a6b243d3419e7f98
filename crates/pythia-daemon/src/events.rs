//! Translation of raw `notify` events into [`FsEvent`]s

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

use pythia_core::FsEvent;

/// How long a rename source waits for its destination before it is
/// treated as a delete (moved out of the folder).
pub const DEFAULT_RENAME_WINDOW: Duration = Duration::from_millis(250);

/// Stateful translator: pairs the two halves of a rename.
///
/// Backends report a rename inside the folder as `From`, `To` and then
/// `Both`. A `From` is held until its `Both` arrives; if none does within
/// the window the file left the folder and a `Deleted` is emitted instead.
#[derive(Debug)]
pub struct EventTranslator {
    window: Duration,
    pending: HashMap<usize, (PathBuf, Instant)>,
}

impl EventTranslator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn translate(&mut self, event: Event) -> Vec<FsEvent> {
        self.translate_at(event, Instant::now())
    }

    /// Translate `event`, received at `now`.
    pub fn translate_at(&mut self, event: Event, now: Instant) -> Vec<FsEvent> {
        let tracker = event.attrs.tracker();

        match event.kind {
            EventKind::Create(_) => files(event.paths).map(FsEvent::Created).collect(),
            EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
            EventKind::Modify(ModifyKind::Name(mode)) => self.rename(mode, event.paths, tracker, now),
            EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
                files(event.paths).map(FsEvent::Modified).collect()
            }
            EventKind::Remove(_) => event.paths.into_iter().map(FsEvent::Deleted).collect(),
        }
    }

    fn rename(
        &mut self,
        mode: RenameMode,
        paths: Vec<PathBuf>,
        tracker: Option<usize>,
        now: Instant,
    ) -> Vec<FsEvent> {
        match mode {
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                let (Some(from), Some(to)) = (paths.next(), paths.next()) else {
                    return Vec::new();
                };
                match tracker {
                    Some(id) => {
                        self.pending.remove(&id);
                    }
                    None => self.pending.retain(|_, (path, _)| *path != from),
                }
                if to.is_dir() {
                    return Vec::new();
                }
                vec![FsEvent::Renamed { from, to }]
            }
            RenameMode::From => match tracker {
                Some(id) => {
                    for path in paths {
                        debug!("Holding rename source {}", path.display());
                        self.pending.insert(id, (path, now));
                    }
                    Vec::new()
                }
                None => paths.into_iter().map(FsEvent::Deleted).collect(),
            },
            RenameMode::To => {
                if tracker.is_some_and(|id| self.pending.contains_key(&id)) {
                    // The paired `Both` carries this rename
                    Vec::new()
                } else {
                    files(paths).map(FsEvent::Created).collect()
                }
            }
            RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .filter(|p| !p.is_dir())
                .map(|p| {
                    if p.exists() {
                        FsEvent::Created(p)
                    } else {
                        FsEvent::Deleted(p)
                    }
                })
                .collect(),
        }
    }

    /// Emit `Deleted` for rename sources whose destination never arrived.
    pub fn flush_expired(&mut self, now: Instant) -> Vec<FsEvent> {
        let window = self.window;
        let expired: Vec<usize> = self
            .pending
            .iter()
            .filter(|(_, (_, since))| now.duration_since(*since) >= window)
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .map(|(path, _)| FsEvent::Deleted(path))
            .collect()
    }

    /// When the oldest held rename source expires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|(_, since)| *since + self.window)
            .min()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for EventTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_RENAME_WINDOW)
    }
}

fn files(paths: Vec<PathBuf>) -> impl Iterator<Item = PathBuf> {
    paths.into_iter().filter(|p| !p.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[PathBuf]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(p.clone()))
    }

    fn rename(mode: RenameMode, paths: &[PathBuf], tracker: usize) -> Event {
        event(EventKind::Modify(ModifyKind::Name(mode)), paths).set_tracker(tracker)
    }

    #[test]
    fn test_basic_kinds() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "").unwrap();
        let mut t = EventTranslator::default();

        assert_eq!(
            t.translate(event(EventKind::Create(CreateKind::File), &[file.clone()])),
            vec![FsEvent::Created(file.clone())]
        );
        assert_eq!(
            t.translate(event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &[file.clone()]
            )),
            vec![FsEvent::Modified(file.clone())]
        );
        assert!(t
            .translate(event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
                &[file.clone()]
            ))
            .is_empty());
        assert_eq!(
            t.translate(event(EventKind::Remove(RemoveKind::File), &[file.clone()])),
            vec![FsEvent::Deleted(file)]
        );
    }

    #[test]
    fn test_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join(".pythia_history");
        std::fs::create_dir(&sub).unwrap();
        let mut t = EventTranslator::default();

        assert!(t
            .translate(event(EventKind::Create(CreateKind::Folder), &[sub]))
            .is_empty());
    }

    #[test]
    fn test_rename_inside_folder() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("old.md");
        let to = dir.path().join("new.md");
        std::fs::write(&to, "x").unwrap();
        let mut t = EventTranslator::default();
        let now = Instant::now();

        assert!(t.translate_at(rename(RenameMode::From, &[from.clone()], 7), now).is_empty());
        assert_eq!(t.pending_len(), 1);
        assert!(t.translate_at(rename(RenameMode::To, &[to.clone()], 7), now).is_empty());
        assert_eq!(
            t.translate_at(rename(RenameMode::Both, &[from.clone(), to.clone()], 7), now),
            vec![FsEvent::Renamed { from, to }]
        );
        assert_eq!(t.pending_len(), 0);
        assert!(t.flush_expired(now + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_rename_out_of_folder_becomes_delete() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("notes.md");
        let mut t = EventTranslator::new(Duration::from_millis(100));
        let now = Instant::now();

        t.translate_at(rename(RenameMode::From, &[from.clone()], 3), now);
        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(100)));
        assert!(t.flush_expired(now + Duration::from_millis(50)).is_empty());
        assert_eq!(
            t.flush_expired(now + Duration::from_millis(100)),
            vec![FsEvent::Deleted(from)]
        );
        assert!(t.next_deadline().is_none());
    }

    #[test]
    fn test_rename_into_folder_becomes_create() {
        let dir = TempDir::new().unwrap();
        let to = dir.path().join("arrived.md");
        std::fs::write(&to, "").unwrap();
        let mut t = EventTranslator::default();

        assert_eq!(
            t.translate(rename(RenameMode::To, &[to.clone()], 9)),
            vec![FsEvent::Created(to)]
        );
    }

    #[test]
    fn test_untracked_rename_checks_existence() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("here.md");
        let absent = dir.path().join("gone.md");
        std::fs::write(&present, "x").unwrap();
        let mut t = EventTranslator::default();

        let any = || EventKind::Modify(ModifyKind::Name(RenameMode::Any));
        assert_eq!(
            t.translate(event(any(), &[present.clone()])),
            vec![FsEvent::Created(present)]
        );
        assert_eq!(
            t.translate(event(any(), &[absent.clone()])),
            vec![FsEvent::Deleted(absent)]
        );
    }
}
