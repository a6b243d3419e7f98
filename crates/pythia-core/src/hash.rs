//! Content fingerprints used to recognise the agent's own writes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a file's exact bytes, hex encoded.
///
/// Only ever compared for equality; it carries no security meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash text content.
    pub fn of(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_same_hash() {
        assert_eq!(ContentHash::of("x=1\n"), ContentHash::of("x=1\n"));
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(ContentHash::of("x=1"), ContentHash::of("x=1\n"));
    }

    #[test]
    fn test_hash_is_fixed_length_hex() {
        let hash = ContentHash::of("");
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash.short().len(), 12);
    }
}
