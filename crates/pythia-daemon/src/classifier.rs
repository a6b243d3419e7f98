//! Decides what a file change means

use std::path::{Path, PathBuf};

use pythia_core::config::WatchConfig;
use pythia_core::markers::{self, Marker};
use pythia_core::{
    extension_of, filename_of, Action, GenerateMode, IgnoreReason, Result, TriggerKind,
    WatchedFile,
};
use tracing::warn;

use crate::guard::IdempotencyGuard;

/// Turns a changed path into exactly one [`Action`].
///
/// Rules are applied in order: name filters, extension allow-list, empty
/// files (generate or ignore), then content (self-write echo, in-progress
/// placeholder, trailing marker, memorize).
#[derive(Debug, Clone)]
pub struct Classifier {
    extensions: Vec<String>,
    diagram_extension: String,
    diagram_sources: Vec<String>,
    placeholder_names: Vec<String>,
}

impl Classifier {
    pub fn from_config(config: &WatchConfig) -> Self {
        let normalize = |exts: &[String]| -> Vec<String> {
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect()
        };

        Self {
            extensions: normalize(&config.extensions),
            diagram_extension: config
                .diagram_extension
                .trim_start_matches('.')
                .to_lowercase(),
            diagram_sources: normalize(&config.diagram_source_extensions),
            placeholder_names: config.placeholder_names.clone(),
        }
    }

    /// Why `filename` is never acted on, if it is filtered by name.
    pub fn filter(&self, filename: &str) -> Option<IgnoreReason> {
        if filename.is_empty() || filename.starts_with('.') || filename.starts_with('~') {
            return Some(IgnoreReason::HiddenOrTemporary);
        }
        if self
            .placeholder_names
            .iter()
            .any(|name| filename.contains(name.as_str()))
        {
            return Some(IgnoreReason::PlaceholderName);
        }

        let extension = extension_of(Path::new(filename));
        if extension != self.diagram_extension && !self.extensions.contains(&extension) {
            return Some(IgnoreReason::UnsupportedExtension);
        }
        None
    }

    /// Whether events for `filename` may be acted on at all.
    pub fn is_tracked(&self, filename: &str) -> bool {
        self.filter(filename).is_none()
    }

    pub fn is_diagram(&self, filename: &str) -> bool {
        extension_of(Path::new(filename)) == self.diagram_extension
    }

    /// Classify the current state of `path`.
    pub fn classify(
        &self,
        path: &Path,
        kind: TriggerKind,
        guard: &IdempotencyGuard,
    ) -> Result<Action> {
        let filename = filename_of(path);
        if let Some(reason) = self.filter(&filename) {
            return Ok(Action::Ignore(reason));
        }

        let Some(file) = WatchedFile::stat(path)? else {
            return Ok(Action::Ignore(IgnoreReason::Missing));
        };

        if file.is_empty() {
            return Ok(match kind {
                TriggerKind::Created => self.classify_empty(&file),
                TriggerKind::Modified => Action::Ignore(IgnoreReason::EmptyModification),
            });
        }

        let content = file.read_content()?;
        if guard.was_last_write(&file.filename, &content) {
            return Ok(Action::Ignore(IgnoreReason::SelfWrite));
        }
        if markers::is_working_placeholder(&content) {
            return Ok(Action::Ignore(IgnoreReason::WorkInProgress));
        }

        Ok(match markers::parse_trailing_marker(&content) {
            Some(Marker::Rollback) => Action::Rollback,
            Some(Marker::Update { instruction }) => Action::Refactor { instruction },
            None => Action::Memorize,
        })
    }

    fn classify_empty(&self, file: &WatchedFile) -> Action {
        if file.extension != self.diagram_extension {
            return Action::Generate(GenerateMode::Compose {
                query: file.stem().replace('_', " "),
            });
        }

        match self.diagram_source(&file.path) {
            Some(source) => Action::Generate(GenerateMode::Visualize { source }),
            None => {
                let stem = file.stem().to_string();
                warn!(
                    "Could not find source code for '{}'. Make sure a file like '{}.py' exists.",
                    file.filename, stem
                );
                Action::Ignore(IgnoreReason::MissingDiagramSource { stem })
            }
        }
    }

    /// First same-stem sibling with a source extension, in probe order.
    pub fn diagram_source(&self, diagram: &Path) -> Option<PathBuf> {
        let folder = diagram.parent()?;
        let file = WatchedFile::describe(diagram, 0);
        let stem = file.stem();

        self.diagram_sources
            .iter()
            .map(|ext| folder.join(format!("{}.{}", stem, ext)))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classifier() -> Classifier {
        Classifier::from_config(&WatchConfig::default())
    }

    fn classify(dir: &TempDir, name: &str, content: &str, kind: TriggerKind) -> Action {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        classifier()
            .classify(&path, kind, &IdempotencyGuard::new())
            .unwrap()
    }

    #[test]
    fn test_name_filters() {
        let c = classifier();
        assert_eq!(c.filter(".env"), Some(IgnoreReason::HiddenOrTemporary));
        assert_eq!(c.filter("~lock.md"), Some(IgnoreReason::HiddenOrTemporary));
        assert_eq!(
            c.filter("New Text Document.txt"),
            Some(IgnoreReason::PlaceholderName)
        );
        assert_eq!(c.filter("Untitled 2.md"), Some(IgnoreReason::PlaceholderName));
        assert_eq!(c.filter("photo.png"), Some(IgnoreReason::UnsupportedExtension));
        assert_eq!(c.filter("Makefile"), Some(IgnoreReason::UnsupportedExtension));
        assert!(c.is_tracked("NOTES.MD"));
        assert!(c.is_tracked("app.mermaid"));
    }

    #[test]
    fn test_empty_created_generates_with_query() {
        let dir = TempDir::new().unwrap();
        let action = classify(&dir, "Generate_Plan.md", "", TriggerKind::Created);
        assert_eq!(
            action,
            Action::Generate(GenerateMode::Compose {
                query: "Generate Plan".to_string()
            })
        );
    }

    #[test]
    fn test_empty_modified_is_ignored() {
        let dir = TempDir::new().unwrap();
        let action = classify(&dir, "plan.md", "", TriggerKind::Modified);
        assert_eq!(action, Action::Ignore(IgnoreReason::EmptyModification));
    }

    #[test]
    fn test_diagram_resolves_sibling() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.js"), "main()").unwrap();
        fs::write(dir.path().join("app.py"), "def main(): pass").unwrap();

        let action = classify(&dir, "app.mermaid", "", TriggerKind::Created);
        assert_eq!(
            action,
            Action::Generate(GenerateMode::Visualize {
                source: dir.path().join("app.py")
            })
        );
    }

    #[test]
    fn test_diagram_without_sibling_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.txt"), "not code").unwrap();

        let action = classify(&dir, "app.mermaid", "", TriggerKind::Created);
        assert_eq!(
            action,
            Action::Ignore(IgnoreReason::MissingDiagramSource {
                stem: "app".to_string()
            })
        );
    }

    #[test]
    fn test_markers() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            classify(&dir, "a.py", "x=1\nUPDATE: add y\n", TriggerKind::Modified),
            Action::Refactor {
                instruction: "add y".to_string()
            }
        );
        assert_eq!(
            classify(&dir, "b.py", "UPDATE: add y\nx=1\nROLLBACK\n\n", TriggerKind::Modified),
            Action::Rollback
        );
        assert_eq!(
            classify(&dir, "c.py", "ROLLBACK\nx=1", TriggerKind::Modified),
            Action::Memorize
        );
        assert_eq!(
            classify(&dir, "d.py", "x=1\nUPDATE:", TriggerKind::Modified),
            Action::Memorize
        );
    }

    #[test]
    fn test_self_write_echo_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x=1\nUPDATE: add y").unwrap();

        let mut guard = IdempotencyGuard::new();
        guard.record("a.py", "x=1\nUPDATE: add y");

        let action = classifier()
            .classify(&path, TriggerKind::Modified, &guard)
            .unwrap();
        assert_eq!(action, Action::Ignore(IgnoreReason::SelfWrite));
    }

    #[test]
    fn test_working_placeholder_is_ignored() {
        let dir = TempDir::new().unwrap();
        let action = classify(
            &dir,
            "plan.md",
            markers::WORKING_PLACEHOLDER,
            TriggerKind::Modified,
        );
        assert_eq!(action, Action::Ignore(IgnoreReason::WorkInProgress));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let action = classifier()
            .classify(
                &dir.path().join("gone.md"),
                TriggerKind::Modified,
                &IdempotencyGuard::new(),
            )
            .unwrap();
        assert_eq!(action, Action::Ignore(IgnoreReason::Missing));
    }

    #[test]
    fn test_filters_run_before_content() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            classify(&dir, ".hidden.py", "x=1\nROLLBACK", TriggerKind::Modified),
            Action::Ignore(IgnoreReason::HiddenOrTemporary)
        );
    }
}
