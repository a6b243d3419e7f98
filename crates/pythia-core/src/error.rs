//! Unified error types for Pythia

use thiserror::Error;

/// Unified error type for all Pythia operations
#[derive(Error, Debug)]
pub enum PythiaError {
    // Startup errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // Brain errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Backend error: {0}")]
    Backend(String),

    // History errors
    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("No snapshot found for {0}")]
    RollbackNotFound(String),

    // Memory errors
    #[error("Knowledge store error: {0}")]
    Store(String),

    // Watcher errors
    #[error("File watcher error: {0}")]
    Watcher(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using PythiaError
pub type Result<T> = std::result::Result<T, PythiaError>;
