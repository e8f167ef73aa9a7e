//! Subscriber registry for live fan-out of ingested records.
//!
//! Each viewer is registered under an opaque id and owns:
//! - a record queue, fed by every broadcast that matches the filter
//! - a reset queue, fed one notification per filter change
//!
//! Delivery is blocking by default: a broadcast hands each record over to
//! every subscriber in turn and waits for it to be taken. A bounded mailbox
//! with an overflow policy is available as an explicit alternative.
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriberRegistry::default();
//! let handle = registry.line_for(&SubscriberId::from("viewer-1"));
//!
//! loop {
//!     select! {
//!         recv(handle.records) -> record => println!("{:?}", record),
//!         recv(handle.resets) -> _ => println!("filter changed"),
//!     }
//! }
//! ```

mod registry;
mod types;

pub use registry::SubscriberRegistry;
pub use types::{DeliveryMode, OverflowPolicy, SubscriberHandle};
