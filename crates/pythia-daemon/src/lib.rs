//! Folder watcher daemon for Pythia.
//!
//! Watches one folder and turns file changes into actions:
//!
//! - **Empty file created**: generate content from the file name and memory
//! - **Empty `.mermaid` created next to `name.py`**: draw a diagram of it
//! - **Trailing `UPDATE: ...` line**: snapshot, then rewrite the file
//! - **Trailing `ROLLBACK` line**: restore the newest snapshot
//! - **Any other edit**: memorize the content
//! - **Delete / rename away**: forget the old name
//!
//! Events are consumed by a single loop and handled one at a time.
//!
//! # Example
//!
//! ```no_run
//! use pythia_brain::{AnthropicBrain, AnthropicClient};
//! use pythia_core::PythiaConfig;
//! use pythia_daemon::Daemon;
//! use pythia_memory::KnowledgeStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PythiaConfig::default();
//! let client = AnthropicClient::from_config("sk-ant-...", &config.brain)?;
//! let memory = KnowledgeStore::from_config(&config.memory)?;
//!
//! let daemon = Daemon::new(&config, AnthropicBrain::new(client), memory);
//! daemon.run_until(tokio::signal::ctrl_c()).await?;
//! # Ok(())
//! # }
//! ```

mod classifier;
mod dispatcher;
mod events;
mod guard;

pub use classifier::Classifier;
pub use dispatcher::{DispatchOutcome, Dispatcher, ReconcileStats};
pub use events::{EventTranslator, DEFAULT_RENAME_WINDOW};
pub use guard::IdempotencyGuard;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pythia_brain::Brain;
use pythia_core::config::PythiaConfig;
use pythia_core::{PythiaError, Result};
use pythia_memory::Memory;

/// Create `folder` if it does not exist. Returns whether it was created.
pub fn ensure_folder(folder: &Path) -> Result<bool> {
    if folder.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(folder)?;
    warn!("Created missing workspace: '{}'", folder.display());
    Ok(true)
}

/// Watches the target folder and feeds events to a [`Dispatcher`].
pub struct Daemon<B: Brain, M: Memory> {
    dispatcher: Dispatcher<B, M>,
    reconcile_on_startup: bool,
    rename_window: Duration,
}

impl<B: Brain, M: Memory> Daemon<B, M> {
    pub fn new(config: &PythiaConfig, brain: B, memory: M) -> Self {
        Self {
            dispatcher: Dispatcher::new(config, brain, memory),
            reconcile_on_startup: config.memory.reconcile_on_startup,
            rename_window: DEFAULT_RENAME_WINDOW,
        }
    }

    pub fn with_rename_window(mut self, window: Duration) -> Self {
        self.rename_window = window;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<B, M> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<B, M> {
        &mut self.dispatcher
    }

    /// Watch until `shutdown` resolves.
    pub async fn run_until<F, T>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = T>,
    {
        let folder = self.dispatcher.folder().to_path_buf();
        info!("Starting daemon, watching: {}", folder.display());

        ensure_folder(&folder)?;

        if self.reconcile_on_startup {
            info!("Reconciling memory with folder contents...");
            if let Err(e) = self.dispatcher.reconcile().await {
                error!("Reconciliation failed: {}", e);
            }
        }

        // Create channels for file system events
        let (fs_tx, fs_rx) = std::sync::mpsc::channel();
        let (event_tx, mut event_rx) = mpsc::channel::<Event>(100);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Err(e) = fs_tx.send(res) {
                    error!("Failed to send file event: {}", e);
                }
            },
            Config::default(),
        )
        .map_err(|e| PythiaError::Watcher(e.to_string()))?;

        watcher
            .watch(&folder, RecursiveMode::NonRecursive)
            .map_err(|e| PythiaError::Watcher(e.to_string()))?;

        // Forward events from the sync channel to the async one
        tokio::task::spawn_blocking(move || {
            while let Ok(res) = fs_rx.recv() {
                match res {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break; // Channel closed
                        }
                    }
                    Err(e) => {
                        error!("File watcher error: {}", e);
                    }
                }
            }
        });

        info!("The Oracle is watching '{}'", folder.display());

        let mut translator = EventTranslator::new(self.rename_window);
        tokio::pin!(shutdown);

        loop {
            let deadline = translator.next_deadline();
            let flush = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                Some(event) = event_rx.recv() => {
                    for fs_event in translator.translate(event) {
                        let outcome = self.dispatcher.handle(fs_event).await;
                        debug!(?outcome, "Event handled");
                    }
                }
                _ = flush => {
                    for fs_event in translator.flush_expired(Instant::now()) {
                        let outcome = self.dispatcher.handle(fs_event).await;
                        debug!(?outcome, "Event handled");
                    }
                }
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        drop(watcher);
        info!("The Oracle sleeps");
        Ok(())
    }
}
