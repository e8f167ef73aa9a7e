//! Durable single-writer backend.
//!
//! A store directory holds the record log and a lock file. The lock keeps a
//! second process from opening the same store; inside the process every
//! append and list goes through one writer handle, one at a time.

use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use super::backend::PersistenceBackend;
use super::log::RecordLog;
use crate::error::{Result, StoreError};
use crate::filter;
use crate::types::LogRecord;

/// Name of the record log inside the store directory.
const LOG_FILE: &str = "records.log";

/// Name of the lock file inside the store directory.
const LOCK_FILE: &str = "LOCK";

/// The open log plus the lock that guards it.
struct Writer {
    log: RecordLog,
    _lock_file: File,
}

/// Durable backend over a [`RecordLog`].
pub struct DurableBackend {
    /// Store directory.
    path: PathBuf,

    /// The one writer; `None` once closed.
    writer: Mutex<Option<Writer>>,
}

impl DurableBackend {
    /// Open the store at `path`, creating the directory if needed.
    pub fn open(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;
        let log = RecordLog::open_with_sync_interval(path.join(LOG_FILE), sync_interval)?;

        info!(
            path = %path.display(),
            next_sequence = %log.next_sequence(),
            "opened durable log"
        );

        Ok(Self {
            path,
            writer: Mutex::new(Some(Writer {
                log,
                _lock_file: lock_file,
            })),
        })
    }

    /// Acquire exclusive lock on the store.
    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        lock_file.try_lock_exclusive().map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceBackend for DurableBackend {
    fn append(&self, content: &str) -> Result<LogRecord> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;
        writer.log.append(content)
    }

    fn list(&self, filter: &str) -> Result<Vec<LogRecord>> {
        let guard = self.writer.lock();
        let writer = guard.as_ref().ok_or(StoreError::Closed)?;
        writer.log.scan(|r| filter::matches(filter, &r.content))
    }

    fn close(&self) -> Result<()> {
        let Some(mut writer) = self.writer.lock().take() else {
            return Ok(());
        };
        writer.log.sync()?;
        info!(path = %self.path.display(), "closed durable log");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "durable"
    }
}
