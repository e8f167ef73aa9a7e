//! Record persistence.
//!
//! Records are appended to a backend that assigns their sequence. Two
//! backends are provided: an in-memory one and a durable log on disk. The
//! store talks to either through [`Persistence`], which adds retries.

mod backend;
mod durable;
mod log;
mod memory;
mod retry;

pub use backend::{Persistence, PersistenceBackend};
pub use durable::DurableBackend;
pub use log::RecordLog;
pub use memory::MemoryBackend;
pub use retry::RetryPolicy;
