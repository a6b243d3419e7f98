//! Suppression of the agent's own write echoes

use std::collections::HashMap;

use pythia_core::ContentHash;

/// Hash of the last content the agent wrote, per filename.
///
/// Only the most recent write is kept: an earlier write (such as the working
/// placeholder) can no longer echo once it has been overwritten. Never
/// persisted.
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    last_written: HashMap<String, ContentHash>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `content` as the agent's latest write to `filename`.
    pub fn record(&mut self, filename: &str, content: &str) -> ContentHash {
        let hash = ContentHash::of(content);
        self.last_written.insert(filename.to_string(), hash.clone());
        hash
    }

    /// Whether `content` is exactly what the agent last wrote to `filename`.
    pub fn was_last_write(&self, filename: &str, content: &str) -> bool {
        self.last_written
            .get(filename)
            .is_some_and(|hash| *hash == ContentHash::of(content))
    }

    /// Drop the entry for `filename`. Returns whether one existed.
    pub fn forget(&mut self, filename: &str) -> bool {
        self.last_written.remove(filename).is_some()
    }

    pub fn len(&self) -> usize {
        self.last_written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_written.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_write_is_recognised() {
        let mut guard = IdempotencyGuard::new();
        let hash = guard.record("a.py", "x=1");

        assert_eq!(hash, ContentHash::of("x=1"));
        assert!(guard.was_last_write("a.py", "x=1"));
        assert!(!guard.was_last_write("a.py", "x=1\n"));
        assert!(!guard.was_last_write("b.py", "x=1"));
    }

    #[test]
    fn test_only_latest_write_is_kept() {
        let mut guard = IdempotencyGuard::new();
        guard.record("plan.md", "placeholder");
        guard.record("plan.md", "final");

        assert!(!guard.was_last_write("plan.md", "placeholder"));
        assert!(guard.was_last_write("plan.md", "final"));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_forget() {
        let mut guard = IdempotencyGuard::new();
        guard.record("notes.md", "hi");

        assert!(guard.forget("notes.md"));
        assert!(!guard.forget("notes.md"));
        assert!(guard.is_empty());
        assert!(!guard.was_last_write("notes.md", "hi"));
    }
}
