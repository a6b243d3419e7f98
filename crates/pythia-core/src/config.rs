//! Configuration management for Pythia
//!
//! Settings live in a single TOML file (`pythia.toml` by default). Every
//! field has a default, so a missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{PythiaError, Result};

/// Top-level Pythia configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PythiaConfig {
    /// Folder watching and classification
    #[serde(default)]
    pub watch: WatchConfig,

    /// Generative backend
    #[serde(default)]
    pub brain: BrainConfig,

    /// Knowledge store
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Which folder to watch and which files count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Folder to watch (created on startup if missing)
    #[serde(default = "default_target_folder")]
    pub target_folder: PathBuf,

    /// Hidden snapshot directory inside the watched folder
    #[serde(default = "default_history_dir")]
    pub history_dir: String,

    /// Extensions (without dot) that Pythia acts on
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Extension that requests a diagram of a same-stem source file
    #[serde(default = "default_diagram_extension")]
    pub diagram_extension: String,

    /// Source extensions probed, in order, when resolving a diagram
    #[serde(default = "default_diagram_source_extensions")]
    pub diagram_source_extensions: Vec<String>,

    /// Editor default names that are never acted on
    #[serde(default = "default_placeholder_names")]
    pub placeholder_names: Vec<String>,

    /// Wait after a create notification before reading the file
    #[serde(default = "default_created_settle_ms")]
    pub created_settle_ms: u64,
}

/// Generative backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainConfig {
    /// Model name (opus, sonnet, haiku)
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Attempts made before a rate-limited request is given up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before retry N is `retry_base_delay_secs * N`
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
}

/// Knowledge store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding the store file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Entries recalled as context for a generation
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    /// Longest document kept per file, in characters
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,

    /// Ollama embedding model; lexical recall is used when unset
    #[serde(default)]
    pub embedding_model: Option<String>,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    /// Memorize existing files and drop stale entries on startup
    #[serde(default = "default_reconcile_on_startup")]
    pub reconcile_on_startup: bool,
}

// Default value providers
fn default_target_folder() -> PathBuf {
    PathBuf::from("Oracle_Files")
}

fn default_history_dir() -> String {
    ".pythia_history".to_string()
}

fn default_extensions() -> Vec<String> {
    ["txt", "py", "js", "html", "css", "md", "json", "sql", "mermaid"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_diagram_extension() -> String {
    "mermaid".to_string()
}

fn default_diagram_source_extensions() -> Vec<String> {
    ["py", "js", "html", "css", "sql", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_placeholder_names() -> Vec<String> {
    vec!["New Text Document".to_string(), "Untitled".to_string()]
}

fn default_created_settle_ms() -> u64 {
    500
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> usize {
    8192
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    30
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pythia_memory")
}

fn default_recall_limit() -> usize {
    3
}

fn default_max_document_chars() -> usize {
    8000
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_reconcile_on_startup() -> bool {
    true
}

impl PythiaConfig {
    /// Load configuration from `path`, or use defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| {
                PythiaError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default configuration to `path`
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| PythiaError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides on top of file values.
    ///
    /// `PYTHIA_TARGET_FOLDER` wins over `TARGET_FOLDER`; `OLLAMA_BASE_URL`
    /// replaces the embedding endpoint.
    pub fn apply_env(&mut self) {
        if let Some(folder) = non_empty_var("PYTHIA_TARGET_FOLDER").or_else(|| non_empty_var("TARGET_FOLDER")) {
            self.watch.target_folder = PathBuf::from(folder);
        }
        if let Some(url) = non_empty_var("OLLAMA_BASE_URL") {
            self.memory.ollama_base_url = url;
        }
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.watch.target_folder.as_os_str().is_empty() {
            return Err(PythiaError::Config("watch.target_folder is empty".to_string()));
        }
        if self.watch.history_dir.is_empty() || !self.watch.history_dir.starts_with('.') {
            return Err(PythiaError::Config(format!(
                "watch.history_dir must be a hidden directory name, got '{}'",
                self.watch.history_dir
            )));
        }
        if self.brain.max_attempts == 0 {
            return Err(PythiaError::Config("brain.max_attempts must be at least 1".to_string()));
        }
        if self.memory.recall_limit == 0 {
            return Err(PythiaError::Config("memory.recall_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Absolute path of the snapshot directory
    pub fn history_path(&self) -> PathBuf {
        self.watch.target_folder.join(&self.watch.history_dir)
    }
}

impl WatchConfig {
    pub fn created_settle(&self) -> Duration {
        Duration::from_millis(self.created_settle_ms)
    }
}

impl BrainConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            target_folder: default_target_folder(),
            history_dir: default_history_dir(),
            extensions: default_extensions(),
            diagram_extension: default_diagram_extension(),
            diagram_source_extensions: default_diagram_source_extensions(),
            placeholder_names: default_placeholder_names(),
            created_settle_ms: default_created_settle_ms(),
        }
    }
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            recall_limit: default_recall_limit(),
            max_document_chars: default_max_document_chars(),
            embedding_model: None,
            ollama_base_url: default_ollama_base_url(),
            reconcile_on_startup: default_reconcile_on_startup(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = PythiaConfig::load_or_default(&dir.path().join("pythia.toml")).unwrap();
        assert_eq!(config.watch.history_dir, ".pythia_history");
        assert_eq!(config.brain.max_attempts, 3);
        assert_eq!(config.memory.recall_limit, 3);
        assert!(config.watch.extensions.contains(&"mermaid".to_string()));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pythia.toml");
        std::fs::write(&path, "[watch]\ntarget_folder = \"/srv/oracle\"\n\n[brain]\nmodel = \"haiku\"\n").unwrap();

        let config = PythiaConfig::load_or_default(&path).unwrap();
        assert_eq!(config.watch.target_folder, PathBuf::from("/srv/oracle"));
        assert_eq!(config.watch.created_settle_ms, 500);
        assert_eq!(config.brain.model, "haiku");
        assert_eq!(config.brain.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pythia.toml");
        std::fs::write(&path, "[watch\n").unwrap();

        let err = PythiaConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, PythiaError::Config(_)));
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/pythia.toml");
        PythiaConfig::write_default(&path).unwrap();

        let config = PythiaConfig::load_or_default(&path).unwrap();
        assert_eq!(config.memory.max_document_chars, 8000);
        assert!(config.memory.embedding_model.is_none());
    }

    #[test]
    fn test_validate_rejects_visible_history_dir() {
        let mut config = PythiaConfig::default();
        config.watch.history_dir = "history".to_string();
        assert!(config.validate().is_err());

        config.watch.history_dir = ".history".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = PythiaConfig::default();
        config.brain.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_path_is_inside_target() {
        let mut config = PythiaConfig::default();
        config.watch.target_folder = PathBuf::from("/srv/oracle");
        assert_eq!(config.history_path(), PathBuf::from("/srv/oracle/.pythia_history"));
    }
}
