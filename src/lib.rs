//! # streamlog
//!
//! Ingests a stream of text lines, records them in arrival order, and fans
//! them out live to any number of connected viewers that share one
//! runtime-mutable substring filter.
//!
//! ## Core Concepts
//!
//! - **Records**: lines with a sequence and timestamp, appended to a memory
//!   or durable backend
//! - **Subscribers**: viewers, each with its own delivery queue and reset queue
//! - **Filter**: case-insensitive substring predicate shared by replay and
//!   live delivery
//! - **Sessions**: the per-viewer backlog-then-stream loop over an encoder
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamlog::{BackendConfig, Format, Store, StoreConfig, ViewerSession};
//!
//! let store = Arc::new(Store::open(StoreConfig {
//!     backend: BackendConfig::durable("./logs"),
//!     ..Default::default()
//! })?);
//!
//! // Viewer thread
//! let id = store.next_subscriber_id();
//! let mut session = ViewerSession::new(Arc::clone(&store), id);
//! let mut encoder = Format::EventStream.encoder(connection);
//! session.run(&mut encoder, &cancel_rx)?;
//!
//! // Ingestion
//! store.scan(std::io::stdin().lock())?;
//! ```

pub mod admin;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod records;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod viewer;

// Re-exports
pub use admin::{client_count, handle_filter_request, parse_filter_request, AdminResponse};
pub use encoding::{Encoder, Format, JsonLinesEncoder, LineTemplate, SseEncoder};
pub use error::{Result, StoreError};
pub use filter::FilterController;
pub use records::{
    DurableBackend, MemoryBackend, Persistence, PersistenceBackend, RecordLog, RetryPolicy,
};
pub use store::{BackendConfig, Store, StoreConfig};
pub use subscriptions::{DeliveryMode, OverflowPolicy, SubscriberHandle, SubscriberRegistry};
pub use types::*;
pub use viewer::{ViewerSession, ViewerState};
