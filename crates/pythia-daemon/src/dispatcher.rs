//! Runs the action chosen for each filesystem event

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use pythia_brain::Brain;
use pythia_core::config::PythiaConfig;
use pythia_core::fail_open::{fail_open_sync, fail_open_with_retries};
use pythia_core::markers::{self, WORKING_PLACEHOLDER};
use pythia_core::{
    extension_of, filename_of, Action, FsEvent, GenerateMode, IgnoreReason, PythiaError, Result,
    TriggerKind, WatchedFile,
};
use pythia_history::{BackupStore, RollbackEngine};
use pythia_memory::Memory;

use crate::classifier::Classifier;
use crate::guard::IdempotencyGuard;

/// Store calls per file during reconciliation before the file is counted
/// as failed.
const RECONCILE_ATTEMPTS: usize = 3;

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// An empty file was filled; `context_from` lists the recalled files
    Generated {
        filename: String,
        context_from: Vec<String>,
    },
    Visualized {
        filename: String,
        source: String,
    },
    Refactored {
        filename: String,
        backup: Option<PathBuf>,
    },
    RolledBack {
        filename: String,
    },
    Memorized {
        filename: String,
    },
    Forgotten {
        filename: String,
    },
    Ignored(IgnoreReason),
    /// The action could not complete; the file was left as it was
    Failed(String),
}

/// Counts from a startup reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub memorized: usize,
    pub forgotten: usize,
    pub failed: usize,
}

/// Sequences classification, history, the brain and memory for one folder.
///
/// Events are handled one at a time through `&mut self`, so the guard needs
/// no locking.
pub struct Dispatcher<B: Brain, M: Memory> {
    folder: PathBuf,
    brain: B,
    memory: M,
    classifier: Classifier,
    guard: IdempotencyGuard,
    backups: BackupStore,
    rollback: RollbackEngine,
    recall_limit: usize,
    created_settle: Duration,
}

impl<B: Brain, M: Memory> Dispatcher<B, M> {
    pub fn new(config: &PythiaConfig, brain: B, memory: M) -> Self {
        let folder = config.watch.target_folder.clone();
        let backups = BackupStore::new(&folder, &config.watch.history_dir);

        Self {
            classifier: Classifier::from_config(&config.watch),
            guard: IdempotencyGuard::new(),
            rollback: RollbackEngine::new(backups.clone()),
            backups,
            recall_limit: config.memory.recall_limit,
            created_settle: config.watch.created_settle(),
            folder,
            brain,
            memory,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn brain(&self) -> &B {
        &self.brain
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: FsEvent) -> DispatchOutcome {
        debug!(?event, "Handling event");
        match event {
            FsEvent::Created(path) => {
                self.settle().await;
                self.handle_change(&path, TriggerKind::Created).await
            }
            FsEvent::Modified(path) => self.handle_change(&path, TriggerKind::Modified).await,
            FsEvent::Deleted(path) => self.handle_delete(&path).await,
            FsEvent::Renamed { from, to } => {
                let forgotten = self.handle_delete(&from).await;
                self.settle().await;
                match self.handle_change(&to, TriggerKind::Created).await {
                    DispatchOutcome::Ignored(_)
                        if matches!(forgotten, DispatchOutcome::Forgotten { .. }) =>
                    {
                        forgotten
                    }
                    outcome => outcome,
                }
            }
        }
    }

    /// Give a new file's writer time to finish before it is read.
    async fn settle(&self) {
        if !self.created_settle.is_zero() {
            tokio::time::sleep(self.created_settle).await;
        }
    }

    async fn handle_change(&mut self, path: &Path, kind: TriggerKind) -> DispatchOutcome {
        let action = match self.classifier.classify(path, kind, &self.guard) {
            Ok(action) => action,
            Err(e) => {
                error!("Failed to classify {}: {}", path.display(), e);
                return DispatchOutcome::Failed(e.to_string());
            }
        };

        let result = match action {
            Action::Generate(GenerateMode::Compose { query }) => self.generate(path, &query).await,
            Action::Generate(GenerateMode::Visualize { source }) => {
                self.visualize(path, &source).await
            }
            Action::Refactor { instruction } => self.refactor(path, &instruction).await,
            Action::Rollback => self.restore(path),
            Action::Memorize => self.memorize(path).await,
            Action::Ignore(reason) => {
                debug!("Ignoring {} ({})", path.display(), reason);
                return DispatchOutcome::Ignored(reason);
            }
        };

        result.unwrap_or_else(|e| {
            match &e {
                PythiaError::RollbackNotFound(_) => {
                    warn!("{}; leaving {} untouched", e, path.display())
                }
                _ => error!("Handler failed for {}: {}", path.display(), e),
            }
            DispatchOutcome::Failed(e.to_string())
        })
    }

    async fn handle_delete(&mut self, path: &Path) -> DispatchOutcome {
        let filename = filename_of(path);
        if let Some(reason) = self.classifier.filter(&filename) {
            return DispatchOutcome::Ignored(reason);
        }

        self.guard.forget(&filename);
        match self.memory.forget(&filename).await {
            Ok(()) => DispatchOutcome::Forgotten { filename },
            Err(e) => {
                error!("Failed to forget {}: {}", filename, e);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Fill an empty file from its name and recalled knowledge.
    async fn generate(&mut self, path: &Path, query: &str) -> Result<DispatchOutcome> {
        let filename = filename_of(path);
        let extension = extension_of(path);
        info!("Generating {}", filename);

        self.write_own(path, WORKING_PLACEHOLDER)?;

        info!("Searching memory for '{}'", query);
        let recalled = match self.memory.recall(query, self.recall_limit + 1).await {
            Ok(recalled) => recalled,
            Err(e) => {
                warn!("Recall failed, generating without context: {}", e);
                Vec::new()
            }
        };

        let mut context = String::new();
        let mut context_from = Vec::new();
        for hit in recalled
            .into_iter()
            .filter(|hit| hit.filename != filename)
            .take(self.recall_limit)
        {
            context.push_str(&format!(
                "\n--- MEMORY FROM {} ---\n{}\n",
                hit.filename, hit.content
            ));
            context_from.push(hit.filename);
        }

        if context_from.is_empty() {
            info!("No context found, running pure generation");
        } else {
            info!("Context found: {:?}", context_from);
        }

        let content = self.brain.generate(&filename, &extension, &context).await;
        self.write_own(path, &content)?;

        info!("Written to {}", filename);
        Ok(DispatchOutcome::Generated {
            filename,
            context_from,
        })
    }

    async fn visualize(&mut self, path: &Path, source: &Path) -> Result<DispatchOutcome> {
        let filename = filename_of(path);
        let source_name = filename_of(source);
        info!("Generating diagram {} for {}", filename, source_name);

        let code = WatchedFile::describe(source, 0).read_content()?;
        let diagram = self.brain.visualize(&source_name, &code).await;
        self.write_own(path, &diagram)?;

        info!("Diagram generated: {}", filename);
        Ok(DispatchOutcome::Visualized {
            filename,
            source: source_name,
        })
    }

    async fn refactor(&mut self, path: &Path, instruction: &str) -> Result<DispatchOutcome> {
        let filename = filename_of(path);
        let extension = extension_of(path);
        info!("Refactoring {}: {}", filename, instruction);

        let content = WatchedFile::describe(path, 0).read_content()?;
        let backup = fail_open_sync("snapshot", || self.backups.snapshot(path)).map(|s| s.path);

        let rewritten = self
            .brain
            .refactor(&filename, &extension, &content, instruction)
            .await;
        self.write_own(path, &rewritten)?;

        info!("Refactored {}", filename);
        Ok(DispatchOutcome::Refactored { filename, backup })
    }

    fn restore(&mut self, path: &Path) -> Result<DispatchOutcome> {
        let filename = filename_of(path);
        let content = self.rollback.rollback(&filename)?;
        self.write_own(path, &content)?;

        info!("Rolled back {}", filename);
        Ok(DispatchOutcome::RolledBack { filename })
    }

    async fn memorize(&mut self, path: &Path) -> Result<DispatchOutcome> {
        let filename = filename_of(path);
        let content = WatchedFile::describe(path, 0).read_content()?;
        self.memory.memorize(&filename, &content).await?;
        Ok(DispatchOutcome::Memorized { filename })
    }

    /// Write `content` and record it as the agent's own write.
    fn write_own(&mut self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)?;
        let hash = self.guard.record(&filename_of(path), content);
        debug!("Recorded own write to {} ({})", path.display(), hash.short());
        Ok(())
    }

    /// Restore a file from its newest snapshot outside the event loop.
    pub fn rollback_file(&mut self, filename: &str) -> Result<DispatchOutcome> {
        let path = self.folder.join(filename);
        self.restore(&path)
    }

    /// Bring memory in line with the folder as it is now.
    ///
    /// Tracked non-empty files are memorized; entries whose file is gone are
    /// forgotten. Store calls are retried, then per-file failures are logged
    /// and counted.
    pub async fn reconcile(&mut self) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        let mut entries = tokio::fs::read_dir(&self.folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let filename = filename_of(&path);
            if !self.classifier.is_tracked(&filename) {
                continue;
            }
            let Some(file) = WatchedFile::stat(&path)? else {
                continue;
            };
            if file.is_empty() {
                continue;
            }

            let Some(content) = fail_open_sync("read", || file.read_content()) else {
                stats.failed += 1;
                continue;
            };
            if markers::is_working_placeholder(&content) {
                continue;
            }

            let memory = &self.memory;
            let stored = fail_open_with_retries(
                "memorize",
                || memory.memorize(&filename, &content),
                RECONCILE_ATTEMPTS,
            )
            .await;
            match stored {
                Some(()) => stats.memorized += 1,
                None => stats.failed += 1,
            }
        }

        let known = self.memory.filenames().await?;
        for filename in known {
            if self.folder.join(&filename).is_file() {
                continue;
            }
            let memory = &self.memory;
            let dropped =
                fail_open_with_retries("forget", || memory.forget(&filename), RECONCILE_ATTEMPTS)
                    .await;
            match dropped {
                Some(()) => stats.forgotten += 1,
                None => stats.failed += 1,
            }
        }

        info!(
            "Reconciled memory: {} memorized, {} forgotten, {} failed",
            stats.memorized, stats.forgotten, stats.failed
        );
        Ok(stats)
    }
}
