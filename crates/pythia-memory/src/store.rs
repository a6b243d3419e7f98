//! JSON-file knowledge store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use pythia_core::config::MemoryConfig;
use pythia_core::fail_open::fail_open;
use pythia_core::{ContentHash, PythiaError, Result};

use crate::embed::{Embedder, OllamaEmbedder};
use crate::scoring::{cosine_similarity, lexical_score};
use crate::{Memory, Recollection};

/// File name of the store inside `store_path`.
pub const STORE_FILE: &str = "knowledge.json";

/// What the store remembers about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub filename: String,
    pub content: String,
    /// Hash of the full content, before truncation
    pub content_hash: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub updated_at: DateTime<Utc>,
}

/// Persistent filename-keyed store.
///
/// The whole store is held in memory and rewritten on every change; the
/// watched folder is small enough that this never matters.
pub struct KnowledgeStore {
    path: PathBuf,
    max_document_chars: usize,
    embedder: Option<Arc<dyn Embedder>>,
    entries: RwLock<BTreeMap<String, KnowledgeEntry>>,
}

impl KnowledgeStore {
    /// Open (or create) the store in directory `dir`.
    pub fn open(dir: &Path, max_document_chars: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            PythiaError::Store(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(STORE_FILE);
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let list: Vec<KnowledgeEntry> = serde_json::from_str(&raw).map_err(|e| {
                PythiaError::Store(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            list.into_iter().map(|e| (e.filename.clone(), e)).collect()
        } else {
            BTreeMap::new()
        };

        debug!("Opened knowledge store {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path,
            max_document_chars,
            embedder: None,
            entries: RwLock::new(entries),
        })
    }

    /// Open the store described by the `[memory]` section, wiring an Ollama
    /// embedder when a model is configured.
    pub fn from_config(config: &MemoryConfig) -> Result<Self> {
        let store = Self::open(&config.store_path, config.max_document_chars)?;
        Ok(match &config.embedding_model {
            Some(model) => {
                info!(model = %model, "Embedding backend configured");
                store.with_embedder(Arc::new(OllamaEmbedder::new(
                    model,
                    &config.ollama_base_url,
                )))
            }
            None => store,
        })
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn get(&self, filename: &str) -> Option<KnowledgeEntry> {
        self.entries.read().await.get(filename).cloned()
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        fail_open("embed", || embedder.embed(text)).await
    }

    /// Write all entries to `<path>.tmp`, then rename over the store file.
    async fn persist(&self, entries: &BTreeMap<String, KnowledgeEntry>) -> Result<()> {
        let list: Vec<&KnowledgeEntry> = entries.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            PythiaError::Store(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            PythiaError::Store(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    fn truncate(&self, content: &str) -> String {
        match content.char_indices().nth(self.max_document_chars) {
            Some((idx, _)) => content[..idx].to_string(),
            None => content.to_string(),
        }
    }
}

#[async_trait]
impl Memory for KnowledgeStore {
    async fn memorize(&self, filename: &str, content: &str) -> Result<()> {
        let content_hash = ContentHash::of(content);

        if let Some(existing) = self.entries.read().await.get(filename) {
            if existing.content_hash == content_hash {
                debug!("{} unchanged ({}), not re-memorized", filename, content_hash.short());
                return Ok(());
            }
        }

        let document = self.truncate(content);
        let embedding = self.embed(&document).await;

        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        updated.insert(
            filename.to_string(),
            KnowledgeEntry {
                filename: filename.to_string(),
                content: document,
                content_hash,
                embedding,
                updated_at: Utc::now(),
            },
        );
        self.persist(&updated).await?;
        *entries = updated;

        info!("Memorized {}", filename);
        Ok(())
    }

    async fn forget(&self, filename: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        if updated.remove(filename).is_none() {
            debug!("{} was not in memory", filename);
            return Ok(());
        }
        self.persist(&updated).await?;
        *entries = updated;

        info!("Forgot {}", filename);
        Ok(())
    }

    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<Recollection>> {
        if limit == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vec = self.embed(query).await;
        let entries = self.entries.read().await;

        let mut scored: Vec<Recollection> = entries
            .values()
            .filter_map(|entry| {
                let score = match (&query_vec, &entry.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => lexical_score(
                        query,
                        &format!("{}\n{}", entry.filename, entry.content),
                    ),
                };
                (score > 0.0).then(|| Recollection {
                    filename: entry.filename.clone(),
                    content: entry.content.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        scored.truncate(limit);
        let matched = scored.len();

        // Top up with the most recently updated entries
        if scored.len() < limit {
            let mut recent: Vec<&KnowledgeEntry> = entries
                .values()
                .filter(|entry| !scored.iter().any(|r| r.filename == entry.filename))
                .collect();
            recent.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then_with(|| a.filename.cmp(&b.filename))
            });
            scored.extend(
                recent
                    .into_iter()
                    .take(limit - scored.len())
                    .map(|entry| Recollection {
                        filename: entry.filename.clone(),
                        content: entry.content.clone(),
                        score: 0.0,
                    }),
            );
        }

        debug!(
            "Recall '{}' matched {} entries ({} recent)",
            query,
            matched,
            scored.len() - matched
        );
        Ok(scored)
    }

    async fn filenames(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
