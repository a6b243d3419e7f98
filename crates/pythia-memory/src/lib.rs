//! # pythia-memory
//!
//! Pythia's knowledge store. Every tracked file that the user edits is
//! remembered under its filename; empty files are filled using whatever the
//! store recalls for their name.
//!
//! Recall ranks by embedding similarity when an [`Embedder`] is configured
//! and falls back to lexical term overlap otherwise.

mod embed;
mod scoring;
mod store;

use async_trait::async_trait;
use pythia_core::Result;
use serde::{Deserialize, Serialize};

pub use embed::{Embedder, OllamaEmbedder};
pub use scoring::{cosine_similarity, lexical_score, tokenize};
pub use store::{KnowledgeEntry, KnowledgeStore, STORE_FILE};

/// One recalled document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recollection {
    pub filename: String,
    pub content: String,
    pub score: f32,
}

/// Knowledge store as seen by the dispatcher.
///
/// Keyed by filename: memorizing a name again replaces its entry.
#[async_trait]
pub trait Memory: Send + Sync {
    async fn memorize(&self, filename: &str, content: &str) -> Result<()>;

    /// Forgetting an unknown filename is not an error.
    async fn forget(&self, filename: &str) -> Result<()>;

    /// Up to `limit` entries, best match first. An empty store yields an
    /// empty list.
    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<Recollection>>;

    /// Every remembered filename, sorted.
    async fn filenames(&self) -> Result<Vec<String>>;
}
