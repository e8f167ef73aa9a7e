//! Main Store struct tying all components together.

use crate::error::Result;
use crate::filter::{self, FilterController};
use crate::records::{DurableBackend, MemoryBackend, Persistence, PersistenceBackend, RetryPolicy};
use crate::subscriptions::{DeliveryMode, SubscriberHandle, SubscriberRegistry};
use crate::types::{LogRecord, SubscriberId};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{error, info};

/// Where records are kept.
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// In-process only; lost when the store is dropped.
    #[default]
    Memory,

    /// On-disk log under `path`.
    Durable {
        /// Store directory (created if missing).
        path: PathBuf,

        /// Sync every N writes (1 = every write).
        sync_interval: u64,
    },
}

impl BackendConfig {
    /// Durable storage at `path`, syncing every write.
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        BackendConfig::Durable {
            path: path.into(),
            sync_interval: 1,
        }
    }
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Persistence backend to open.
    pub backend: BackendConfig,

    /// How records reach subscribers.
    pub delivery: DeliveryMode,

    /// Wrap filter matches in the snapshot with ANSI highlight markers.
    pub highlight_matches: bool,

    /// Retry policy for appends (and for opening the backend).
    pub write_retry: RetryPolicy,

    /// Retry policy for listing.
    pub read_retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            delivery: DeliveryMode::default(),
            highlight_matches: false,
            write_retry: RetryPolicy::writes(),
            read_retry: RetryPolicy::reads(),
        }
    }
}

/// The log store.
///
/// Provides a unified interface for:
/// - Ingesting lines and persisting them in arrival order
/// - Fanning new records out to connected subscribers
/// - Replaying the filtered backlog
/// - Changing the shared filter
///
/// Shared across threads as `Arc<Store>`.
pub struct Store {
    /// Backend plus retry policies.
    persistence: Persistence,

    /// Connected subscribers.
    registry: SubscriberRegistry,

    /// Active filter.
    filter: FilterController,

    /// Highlight matches in snapshots.
    highlight: bool,

    /// Counter behind `next_subscriber_id`.
    next_id: AtomicU64,

    closed: AtomicBool,
}

impl Store {
    /// Open a store with the configured backend.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let backend: Box<dyn PersistenceBackend> = match &config.backend {
            BackendConfig::Memory => Box::new(MemoryBackend::new()),
            BackendConfig::Durable {
                path,
                sync_interval,
            } => Box::new(
                config
                    .write_retry
                    .run("open", || DurableBackend::open(path, *sync_interval))?,
            ),
        };
        Ok(Self::with_backend(config, backend))
    }

    /// An in-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::with_backend(StoreConfig::default(), Box::new(MemoryBackend::new()))
    }

    /// Build a store over an already opened backend. `config.backend` is
    /// ignored.
    pub fn with_backend(config: StoreConfig, backend: Box<dyn PersistenceBackend>) -> Self {
        let persistence = Persistence::new(backend, config.write_retry, config.read_retry);
        info!(
            backend = persistence.kind(),
            delivery = ?config.delivery,
            "store opened"
        );

        Self {
            persistence,
            registry: SubscriberRegistry::new(config.delivery),
            filter: FilterController::new(),
            highlight: config.highlight_matches,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    // --- Ingestion ---

    /// Persist one line and broadcast it to every subscriber if it matches
    /// the current filter.
    ///
    /// Returns `None` when the write failed after retries; the line is
    /// dropped and ingestion may continue.
    ///
    /// Under [`DeliveryMode::Blocking`] this waits until every subscriber has
    /// taken the record (or disconnected). There is no delivery timeout.
    pub fn ingest(&self, content: &str) -> Option<LogRecord> {
        let record = match self.persistence.append(content) {
            Ok(record) => record,
            Err(e) => {
                error!(
                    backend = self.persistence.kind(),
                    error = %e,
                    "dropping line after failed write"
                );
                return None;
            }
        };

        if self.filter.matches(&record.content) {
            self.registry.broadcast(&record);
        }
        Some(record)
    }

    /// Ingest newline-delimited input until end of stream. Returns the number
    /// of lines read (including any that were dropped).
    ///
    /// Invalid UTF-8 is replaced, and a trailing `\n` or `\r\n` is removed.
    pub fn scan<R: BufRead>(&self, mut reader: R) -> Result<u64> {
        let mut buf = Vec::new();
        let mut lines = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            self.ingest(&String::from_utf8_lossy(&buf));
            lines += 1;
        }
        Ok(lines)
    }

    // --- Replay ---

    /// Every stored record matching the current filter, in order.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        let filter = self.filter.get();
        let mut records = self.persistence.list(&filter);
        if self.highlight && !filter.is_empty() {
            for record in &mut records {
                record.content = filter::highlight(&record.content, &filter);
            }
        }
        records
    }

    // --- Subscribers ---

    /// Get or create the delivery queues for `id`.
    pub fn line_for(&self, id: &SubscriberId) -> SubscriberHandle {
        self.registry.line_for(id)
    }

    /// Remove `id`. Returns false if it was not registered.
    pub fn disconnect(&self, id: &SubscriberId) -> bool {
        self.registry.disconnect(id)
    }

    /// Registered subscriber ids, sorted.
    pub fn clients(&self) -> Vec<SubscriberId> {
        self.registry.clients()
    }

    /// A fresh id not handed out before by this store.
    pub fn next_subscriber_id(&self) -> SubscriberId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        SubscriberId::new(format!("viewer-{}", n))
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.registry.mode()
    }

    // --- Filter ---

    /// Replace the filter and tell every subscriber to reload. Returns the
    /// number of subscribers notified.
    pub fn set_filter(&self, value: impl Into<String>) -> usize {
        self.filter.set(value, &self.registry)
    }

    /// Current filter value.
    pub fn filter(&self) -> String {
        self.filter.get()
    }

    // --- Lifecycle ---

    /// Drop every subscriber and close the backend. Later calls do nothing.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let dropped = self.registry.clear();
        self.persistence.close()?;
        info!(
            backend = self.persistence.kind(),
            subscribers = dropped,
            "store closed"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "failed to close store");
        }
    }
}
