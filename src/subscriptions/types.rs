//! Subscription types for live store updates.

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::types::{LogRecord, SubscriberId};

/// What a broadcast does when a subscriber is not keeping up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Discard the record being delivered.
    DropNewest,
    /// Evict the oldest queued record to make room.
    DropOldest,
}

/// How records reach a subscriber's queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Rendezvous hand-off. Ingestion waits until each matching subscriber
    /// takes the record or is disconnected. There is no timeout, so a viewer
    /// that stops reading stalls ingestion.
    #[default]
    Blocking,

    /// Bounded mailbox per subscriber. Deliveries never wait; a full
    /// mailbox applies the overflow policy instead.
    Buffered {
        capacity: usize,
        overflow: OverflowPolicy,
    },
}

/// A viewer's end of its delivery queues.
///
/// Handles for the same id share the same queues until the id is
/// disconnected. After that, the queues stay empty for good.
#[derive(Clone)]
pub struct SubscriberHandle {
    pub id: SubscriberId,

    /// Live records matching the filter at ingest time.
    pub records: Receiver<LogRecord>,

    /// One message per filter change (payload-free).
    pub resets: Receiver<()>,

    /// Never carries a message; disconnects when the id is deregistered.
    pub(crate) closed: Receiver<()>,
}

impl SubscriberHandle {
    /// Receive the next record (blocking).
    pub fn recv(&self) -> Result<LogRecord, RecvError> {
        self.records.recv()
    }

    /// Try to receive a record (non-blocking).
    pub fn try_recv(&self) -> Result<LogRecord, TryRecvError> {
        self.records.try_recv()
    }

    /// Receive a record with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LogRecord, RecvTimeoutError> {
        self.records.recv_timeout(timeout)
    }

    /// Consume a pending reset notification, if any.
    pub fn try_recv_reset(&self) -> bool {
        self.resets.try_recv().is_ok()
    }

    /// Channel that becomes disconnected once this id is deregistered.
    /// Suitable for use in `crossbeam_channel::select!`.
    pub fn closed(&self) -> &Receiver<()> {
        &self.closed
    }

    /// Whether the id is still present in the registry.
    pub fn is_registered(&self) -> bool {
        !matches!(self.closed.try_recv(), Err(TryRecvError::Disconnected))
    }
}
