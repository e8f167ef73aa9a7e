//! The persistence capability shared by every backend, and the retrying
//! wrapper the store talks to.

use tracing::error;

use super::retry::RetryPolicy;
use crate::error::Result;
use crate::types::LogRecord;

/// Append-only record storage.
///
/// Each call is a single attempt; retrying is the caller's concern (see
/// [`Persistence`]).
pub trait PersistenceBackend: Send + Sync {
    /// Assign a sequence and timestamp to `content` and store it.
    fn append(&self, content: &str) -> Result<LogRecord>;

    /// Every record whose content contains `filter` case-insensitively, in
    /// ascending sequence order. An empty filter returns everything.
    fn list(&self, filter: &str) -> Result<Vec<LogRecord>>;

    /// Release underlying resources. Calling it again is a no-op.
    fn close(&self) -> Result<()>;

    /// Short label used in logs.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

/// A backend plus the retry policies applied to it.
pub struct Persistence {
    backend: Box<dyn PersistenceBackend>,
    write_retry: RetryPolicy,
    read_retry: RetryPolicy,
}

impl Persistence {
    pub fn new(
        backend: Box<dyn PersistenceBackend>,
        write_retry: RetryPolicy,
        read_retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            write_retry,
            read_retry,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Store `content`, retrying transient failures with the write policy.
    pub fn append(&self, content: &str) -> Result<LogRecord> {
        self.write_retry.run("append", || self.backend.append(content))
    }

    /// List matching records, retrying with the read policy. Never fails:
    /// when the attempts run out the error is logged and the list is empty.
    pub fn list(&self, filter: &str) -> Vec<LogRecord> {
        match self.read_retry.run("list", || self.backend.list(filter)) {
            Ok(records) => records,
            Err(e) => {
                error!(backend = self.kind(), filter, error = %e, "failed to list records");
                Vec::new()
            }
        }
    }

    pub fn close(&self) -> Result<()> {
        self.backend.close()
    }
}
