//! Error handling and edge case tests.

use parking_lot::Mutex;
use std::io;
use std::time::{Duration, Instant};
use streamlog::{
    handle_filter_request, BackendConfig, LogRecord, MemoryBackend, PersistenceBackend,
    RetryPolicy, Sequence, Store, StoreConfig, StoreError,
};
use tempfile::TempDir;

/// Memory backend whose next few calls fail.
struct FlakyBackend {
    inner: MemoryBackend,
    append_failures: Mutex<u32>,
    list_failures: Mutex<u32>,
    append_calls: Mutex<u32>,
    list_calls: Mutex<u32>,
    /// Every list reports a checksum mismatch.
    damaged: Mutex<bool>,
}

impl FlakyBackend {
    fn new(append_failures: u32, list_failures: u32) -> Self {
        Self {
            inner: MemoryBackend::new(),
            append_failures: Mutex::new(append_failures),
            list_failures: Mutex::new(list_failures),
            append_calls: Mutex::new(0),
            list_calls: Mutex::new(0),
            damaged: Mutex::new(false),
        }
    }

    fn fail(remaining: &Mutex<u32>) -> Option<StoreError> {
        let mut remaining = remaining.lock();
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk hiccup")))
    }
}

impl PersistenceBackend for FlakyBackend {
    fn append(&self, content: &str) -> streamlog::Result<LogRecord> {
        *self.append_calls.lock() += 1;
        match Self::fail(&self.append_failures) {
            Some(e) => Err(e),
            None => self.inner.append(content),
        }
    }

    fn list(&self, filter: &str) -> streamlog::Result<Vec<LogRecord>> {
        *self.list_calls.lock() += 1;
        if *self.damaged.lock() {
            return Err(StoreError::ChecksumMismatch { expected: 1, got: 2 });
        }
        match Self::fail(&self.list_failures) {
            Some(e) => Err(e),
            None => self.inner.list(filter),
        }
    }

    fn close(&self) -> streamlog::Result<()> {
        self.inner.close()
    }
}

/// Shares a backend with the test so call counts stay observable.
struct Shared(std::sync::Arc<FlakyBackend>);

impl PersistenceBackend for Shared {
    fn append(&self, content: &str) -> streamlog::Result<LogRecord> {
        self.0.append(content)
    }

    fn list(&self, filter: &str) -> streamlog::Result<Vec<LogRecord>> {
        self.0.list(filter)
    }

    fn close(&self) -> streamlog::Result<()> {
        self.0.close()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn fast_config() -> StoreConfig {
    StoreConfig {
        write_retry: RetryPolicy::new(3, Duration::from_millis(1)),
        read_retry: RetryPolicy::new(10, Duration::from_millis(1)),
        ..Default::default()
    }
}

// --- Persistence failures ---

#[test]
fn test_transient_write_failure_is_retried() {
    init_tracing();
    let store = Store::with_backend(fast_config(), Box::new(FlakyBackend::new(2, 0)));

    let record = store.ingest("eventually").unwrap();
    assert_eq!(record.sequence, Sequence(1));
    assert_eq!(store.snapshot().len(), 1);
}

#[test]
fn test_exhausted_write_drops_line_and_ingestion_continues() {
    init_tracing();
    let backend = std::sync::Arc::new(FlakyBackend::new(3, 0));
    let store = Store::with_backend(fast_config(), Box::new(Shared(backend.clone())));

    assert!(store.ingest("lost").is_none());
    assert_eq!(*backend.append_calls.lock(), 3);

    let kept = store.ingest("kept").unwrap();
    assert_eq!(kept.content, "kept");

    let snapshot: Vec<String> = store.snapshot().into_iter().map(|r| r.content).collect();
    assert_eq!(snapshot, vec!["kept"]);
}

#[test]
fn test_transient_read_failure_is_retried() {
    let store = Store::with_backend(fast_config(), Box::new(FlakyBackend::new(0, 9)));
    store.ingest("a");

    assert_eq!(store.snapshot().len(), 1);
}

#[test]
fn test_exhausted_read_yields_empty_snapshot() {
    init_tracing();
    let store = Store::with_backend(fast_config(), Box::new(FlakyBackend::new(0, 10)));
    store.ingest("a");

    assert!(store.snapshot().is_empty());
    // The next read has no failures left.
    assert_eq!(store.snapshot().len(), 1);
}

#[test]
fn test_corrupt_log_fails_open_without_backoff() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = || StoreConfig {
        backend: BackendConfig::durable(dir.path().join("logs")),
        ..Default::default()
    };

    {
        let store = Store::open(config()).unwrap();
        store.ingest("first");
        store.ingest("second");
    }

    // Flip a content byte of the first frame.
    let log_path = dir.path().join("logs").join("records.log");
    let mut bytes = std::fs::read(&log_path).unwrap();
    bytes[26] ^= 0xff;
    std::fs::write(&log_path, &bytes).unwrap();

    // Opening scans the log too, so the damage surfaces right away.
    let started = Instant::now();
    assert!(matches!(
        Store::open(config()),
        Err(StoreError::ChecksumMismatch { .. })
    ));
    assert!(started.elapsed() < Duration::from_millis(900));
}

#[test]
fn test_damaged_read_is_not_retried() {
    init_tracing();
    let backend = std::sync::Arc::new(FlakyBackend::new(0, 0));
    let store = Store::with_backend(StoreConfig::default(), Box::new(Shared(backend.clone())));
    store.ingest("a");

    *backend.damaged.lock() = true;
    let started = Instant::now();
    assert!(store.snapshot().is_empty());
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(*backend.list_calls.lock(), 1);
}

// --- Lifecycle ---

#[test]
fn test_closed_store_drops_writes() {
    let store = Store::with_backend(fast_config(), Box::new(MemoryBackend::new()));
    store.close().unwrap();

    assert!(store.ingest("after close").is_none());
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_second_store_on_same_directory_is_locked() {
    let dir = TempDir::new().unwrap();
    let config = || StoreConfig {
        backend: BackendConfig::durable(dir.path().join("logs")),
        ..fast_config()
    };

    let _first = Store::open(config()).unwrap();
    assert!(matches!(Store::open(config()), Err(StoreError::Locked)));
}

#[test]
fn test_retry_error_reports_attempts() {
    let policy = RetryPolicy::new(2, Duration::from_millis(1));
    let err = policy
        .run("append", || -> streamlog::Result<()> {
            Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "busy")))
        })
        .unwrap_err();

    match err {
        StoreError::RetriesExhausted {
            operation,
            attempts,
            ..
        } => {
            assert_eq!(operation, "append");
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// --- Admin requests ---

#[test]
fn test_rejected_admin_requests_leave_filter_alone() {
    let store = Store::in_memory();
    store.set_filter("current");

    assert_eq!(handle_filter_request(&store, "PUT", br#"{"filter":"x"}"#).status, 405);
    assert_eq!(handle_filter_request(&store, "POST", b"{filter}").status, 400);
    assert_eq!(handle_filter_request(&store, "POST", br#"{"filter":true}"#).status, 400);
    assert_eq!(store.filter(), "current");
}
