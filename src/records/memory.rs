//! Ephemeral in-process backend.

use parking_lot::RwLock;

use super::backend::PersistenceBackend;
use crate::error::{Result, StoreError};
use crate::filter;
use crate::types::{LogRecord, Sequence, Timestamp};

/// Keeps records in a vector for the life of the process.
pub struct MemoryBackend {
    /// `None` once closed.
    records: RwLock<Option<Vec<LogRecord>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Some(Vec::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn append(&self, content: &str) -> Result<LogRecord> {
        let mut guard = self.records.write();
        let records = guard.as_mut().ok_or(StoreError::Closed)?;

        let sequence = Sequence(records.len() as u64 + 1);
        let record = LogRecord::new(sequence, content, Timestamp::now());
        records.push(record.clone());
        Ok(record)
    }

    fn list(&self, filter: &str) -> Result<Vec<LogRecord>> {
        let guard = self.records.read();
        let records = guard.as_ref().ok_or(StoreError::Closed)?;

        Ok(records
            .iter()
            .filter(|r| filter::matches(filter, &r.content))
            .cloned()
            .collect())
    }

    fn close(&self) -> Result<()> {
        self.records.write().take();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_increasing_sequence() {
        let backend = MemoryBackend::new();
        let first = backend.append("one").unwrap();
        let second = backend.append("two").unwrap();

        assert_eq!(first.sequence, Sequence(1));
        assert_eq!(second.sequence, Sequence(2));
        assert!(first.timestamp <= second.timestamp);
    }

    #[test]
    fn test_list_filters_case_insensitively_in_order() {
        let backend = MemoryBackend::new();
        for line in ["Hello World", "goodbye", "New WORLD"] {
            backend.append(line).unwrap();
        }

        let all: Vec<_> = backend.list("").unwrap().into_iter().map(|r| r.content).collect();
        assert_eq!(all, vec!["Hello World", "goodbye", "New WORLD"]);

        let worlds: Vec<_> = backend
            .list("world")
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(worlds, vec!["Hello World", "New WORLD"]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.append("x").unwrap();

        backend.close().unwrap();
        backend.close().unwrap();

        assert!(matches!(backend.append("y"), Err(StoreError::Closed)));
        assert!(matches!(backend.list(""), Err(StoreError::Closed)));
    }
}
