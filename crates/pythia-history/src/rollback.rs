//! Restore the newest snapshot of a file

use tracing::{info, warn};

use pythia_core::markers::strip_trailing_markers;
use pythia_core::{PythiaError, Result};

use crate::BackupStore;

/// Picks the newest snapshot and prepares it for writing back.
///
/// The engine never writes the watched file itself; the caller does, so the
/// write can be recorded as the agent's own.
#[derive(Debug, Clone)]
pub struct RollbackEngine {
    store: BackupStore,
}

impl RollbackEngine {
    pub fn new(store: BackupStore) -> Self {
        Self { store }
    }

    /// Content to restore for `filename`.
    ///
    /// Trailing blank and marker lines are stripped so the restored file does
    /// not trigger another command. Returns `RollbackNotFound` when no
    /// snapshot exists.
    pub fn rollback(&self, filename: &str) -> Result<String> {
        let Some(snapshot) = self.store.latest(filename)? else {
            warn!("No snapshot found for {}", filename);
            return Err(PythiaError::RollbackNotFound(filename.to_string()));
        };

        let content = snapshot.read_content()?;
        info!("Restoring {} from {}", filename, snapshot.file_name());
        Ok(strip_trailing_markers(&content))
    }
}
