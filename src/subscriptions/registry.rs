//! Registry of connected viewers and the fan-out over their queues.

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::types::{DeliveryMode, OverflowPolicy, SubscriberHandle};
use crate::types::{LogRecord, SubscriberId};

/// Internal subscriber state. Dropping it releases every queue it owns and
/// disconnects the `closed` channel seen by handles and in-flight deliveries.
struct Subscriber {
    records_tx: Sender<LogRecord>,
    records_rx: Receiver<LogRecord>,
    resets_tx: Sender<()>,
    resets_rx: Receiver<()>,
    _closed_tx: Sender<()>,
    closed_rx: Receiver<()>,
}

impl Subscriber {
    fn new(mode: DeliveryMode) -> Self {
        let capacity = match mode {
            DeliveryMode::Blocking => 0,
            DeliveryMode::Buffered { capacity, .. } => capacity.max(1),
        };
        let (records_tx, records_rx) = bounded(capacity);
        let (resets_tx, resets_rx) = unbounded();
        let (closed_tx, closed_rx) = bounded(0);

        Self {
            records_tx,
            records_rx,
            resets_tx,
            resets_rx,
            _closed_tx: closed_tx,
            closed_rx,
        }
    }

    fn handle(&self, id: &SubscriberId) -> SubscriberHandle {
        SubscriberHandle {
            id: id.clone(),
            records: self.records_rx.clone(),
            resets: self.resets_rx.clone(),
            closed: self.closed_rx.clone(),
        }
    }

    fn target(&self, id: &SubscriberId) -> DeliveryTarget {
        DeliveryTarget {
            id: id.clone(),
            records_tx: self.records_tx.clone(),
            records_rx: self.records_rx.clone(),
            closed_rx: self.closed_rx.clone(),
        }
    }
}

/// Everything a broadcast needs to reach one subscriber, captured under the
/// registry lock so delivery can proceed without holding it.
struct DeliveryTarget {
    id: SubscriberId,
    records_tx: Sender<LogRecord>,
    records_rx: Receiver<LogRecord>,
    closed_rx: Receiver<()>,
}

/// Tracks connected viewers, keyed and enumerated by id.
pub struct SubscriberRegistry {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
    mode: DeliveryMode,
}

impl SubscriberRegistry {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            mode,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Get the queues for `id`, registering it first if it is unknown.
    pub fn line_for(&self, id: &SubscriberId) -> SubscriberHandle {
        if let Some(sub) = self.subscribers.read().get(id) {
            return sub.handle(id);
        }

        let mut subs = self.subscribers.write();
        let sub = subs.entry(id.clone()).or_insert_with(|| {
            debug!(subscriber = %id, "subscriber registered");
            Subscriber::new(self.mode)
        });
        sub.handle(id)
    }

    /// Deregister `id`. A broadcast blocked on this subscriber is released.
    /// Returns whether the id was registered.
    pub fn disconnect(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(id).is_some();
        if removed {
            info!(subscriber = %id, "client disconnected");
        }
        removed
    }

    /// Deregister everyone.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.subscribers.write());
        for id in drained.keys() {
            info!(subscriber = %id, "client disconnected");
        }
        drained.len()
    }

    /// Registered ids in sorted order.
    pub fn clients(&self) -> Vec<SubscriberId> {
        self.subscribers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Post one reset notification to every registered subscriber.
    /// Returns the number of subscribers notified.
    pub fn notify_reset(&self) -> usize {
        let subs = self.subscribers.read();
        subs.values()
            .filter(|sub| sub.resets_tx.try_send(()).is_ok())
            .count()
    }

    /// Deliver `record` to every subscriber registered right now, in id
    /// order. Returns the number of subscribers that received it.
    pub fn broadcast(&self, record: &LogRecord) -> usize {
        let targets: Vec<DeliveryTarget> = {
            let subs = self.subscribers.read();
            subs.iter().map(|(id, sub)| sub.target(id)).collect()
        };

        targets
            .iter()
            .filter(|target| self.deliver(target, record))
            .count()
    }

    fn deliver(&self, target: &DeliveryTarget, record: &LogRecord) -> bool {
        match self.mode {
            DeliveryMode::Blocking => select! {
                send(target.records_tx, record.clone()) -> res => res.is_ok(),
                recv(target.closed_rx) -> _ => false,
            },
            DeliveryMode::Buffered { overflow, .. } => {
                match target.records_tx.try_send(record.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(record)) => match overflow {
                        OverflowPolicy::DropNewest => {
                            warn!(subscriber = %target.id, sequence = %record.sequence, "mailbox full, dropping newest record");
                            false
                        }
                        OverflowPolicy::DropOldest => {
                            if let Ok(evicted) = target.records_rx.try_recv() {
                                warn!(subscriber = %target.id, sequence = %evicted.sequence, "mailbox full, dropping oldest record");
                            }
                            target.records_tx.try_send(record).is_ok()
                        }
                    },
                    Err(TrySendError::Disconnected(_)) => false,
                }
            }
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DeliveryMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sequence, Timestamp};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn make_record(seq: u64, content: &str) -> LogRecord {
        LogRecord::new(Sequence(seq), content, Timestamp::now())
    }

    #[test]
    fn test_line_for_is_idempotent() {
        let registry = SubscriberRegistry::default();
        let id = SubscriberId::from("a");

        let _first = registry.line_for(&id);
        let _second = registry.line_for(&id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clients_are_sorted() {
        let registry = SubscriberRegistry::default();
        for id in ["charlie", "alpha", "bravo"] {
            registry.line_for(&SubscriberId::from(id));
        }

        let clients: Vec<String> = registry
            .clients()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(clients, vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_disconnect_marks_handle_unregistered() {
        let registry = SubscriberRegistry::default();
        let id = SubscriberId::from("a");
        let handle = registry.line_for(&id);
        assert!(handle.is_registered());

        assert!(registry.disconnect(&id));
        assert!(!handle.is_registered());
        assert!(!registry.disconnect(&id));
    }

    #[test]
    fn test_reused_id_gets_fresh_queue() {
        let registry = SubscriberRegistry::new(DeliveryMode::Buffered {
            capacity: 4,
            overflow: OverflowPolicy::DropNewest,
        });
        let id = SubscriberId::from("a");

        let old = registry.line_for(&id);
        registry.broadcast(&make_record(1, "before"));
        registry.disconnect(&id);

        let new = registry.line_for(&id);
        registry.broadcast(&make_record(2, "after"));

        assert_eq!(new.try_recv().unwrap().content, "after");
        assert!(new.try_recv().is_err());
        // The old handle only ever sees what was sent while it was live.
        assert_eq!(old.try_recv().unwrap().content, "before");
        assert!(old.try_recv().is_err());
    }

    #[test]
    fn test_blocking_broadcast_waits_for_reader() {
        let registry = Arc::new(SubscriberRegistry::default());
        let handle = registry.line_for(&SubscriberId::from("a"));

        let sender = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.broadcast(&make_record(1, "hello")))
        };

        let record = handle.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(record.content, "hello");
        assert_eq!(sender.join().unwrap(), 1);
    }

    #[test]
    fn test_disconnect_releases_blocked_broadcast() {
        let registry = Arc::new(SubscriberRegistry::default());
        let id = SubscriberId::from("stalled");
        let _handle = registry.line_for(&id);

        let sender = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.broadcast(&make_record(1, "never read")))
        };

        thread::sleep(Duration::from_millis(50));
        registry.disconnect(&id);
        assert_eq!(sender.join().unwrap(), 0);
    }

    #[test]
    fn test_notify_reset_once_per_subscriber() {
        let registry = SubscriberRegistry::default();
        let a = registry.line_for(&SubscriberId::from("a"));
        let b = registry.line_for(&SubscriberId::from("b"));

        assert_eq!(registry.notify_reset(), 2);
        assert!(a.try_recv_reset());
        assert!(b.try_recv_reset());
        assert!(!a.try_recv_reset());
        assert!(!b.try_recv_reset());
    }

    #[test]
    fn test_unread_resets_are_all_kept() {
        let registry = SubscriberRegistry::default();
        let a = registry.line_for(&SubscriberId::from("a"));

        assert_eq!(registry.notify_reset(), 1);
        assert_eq!(registry.notify_reset(), 1);
        assert!(a.try_recv_reset());
        assert!(a.try_recv_reset());
        assert!(!a.try_recv_reset());
    }

    #[test]
    fn test_drop_newest_when_mailbox_full() {
        let registry = SubscriberRegistry::new(DeliveryMode::Buffered {
            capacity: 2,
            overflow: OverflowPolicy::DropNewest,
        });
        let handle = registry.line_for(&SubscriberId::from("a"));

        for i in 1..=4 {
            registry.broadcast(&make_record(i, &format!("r{}", i)));
        }

        assert_eq!(handle.try_recv().unwrap().content, "r1");
        assert_eq!(handle.try_recv().unwrap().content, "r2");
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn test_drop_oldest_when_mailbox_full() {
        let registry = SubscriberRegistry::new(DeliveryMode::Buffered {
            capacity: 2,
            overflow: OverflowPolicy::DropOldest,
        });
        let handle = registry.line_for(&SubscriberId::from("a"));

        for i in 1..=4 {
            registry.broadcast(&make_record(i, &format!("r{}", i)));
        }

        assert_eq!(handle.try_recv().unwrap().content, "r3");
        assert_eq!(handle.try_recv().unwrap().content, "r4");
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn test_clear_drops_everyone() {
        let registry = SubscriberRegistry::default();
        let a = registry.line_for(&SubscriberId::from("a"));
        registry.line_for(&SubscriberId::from("b"));

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(!a.is_registered());
    }
}
